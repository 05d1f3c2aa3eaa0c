use alert_feed::Alert;
use serde::Serialize;
use std::io::{self, Write};

#[derive(clap::Args, Clone, Debug, Default)]
pub struct Output {
    /// How to format CLI output
    #[clap(global = true, short, long, value_enum)]
    pub output: Option<OutputType>,
}

#[derive(clap::ValueEnum, Debug, Copy, Clone, PartialEq)]
pub enum OutputType {
    /// Format output as compact JSON, one alert per line
    Json,
    /// Format the output as a pretty-printed table
    Table,
}

impl Output {
    pub fn get_output_type(&self) -> OutputType {
        self.output.unwrap_or(OutputType::Table)
    }

    /// Print the current `alerts`, resolving image URLs against `api_base`.
    pub fn print_alerts(&self, alerts: &[Alert], api_base: &url::Url) -> anyhow::Result<()> {
        let rows: Vec<AlertRow> = alerts.iter().map(|a| AlertRow::new(a, api_base)).collect();
        let mut stdout = io::stdout().lock();

        match self.get_output_type() {
            OutputType::Json => write_json(&mut stdout, &rows)?,
            OutputType::Table => {
                for line in render_table(&rows).lines() {
                    stdout.write_all(line.as_bytes())?;
                    stdout.write_all(b"\n")?;
                }
            }
        }
        stdout.flush()?;
        Ok(())
    }
}

/// AlertRow is the printed representation of an Alert.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AlertRow<'a> {
    image_id: &'a str,
    timestamp: &'a str,
    visitor_id: &'a str,
    cam_id: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
}

impl<'a> AlertRow<'a> {
    pub fn new(alert: &'a Alert, api_base: &url::Url) -> Self {
        Self {
            image_id: &alert.image_id,
            timestamp: alert.timestamp.as_deref().unwrap_or_default(),
            visitor_id: &alert.visitor_id,
            cam_id: &alert.cam_id,
            status: &alert.status,
            image_url: alert.image_url(api_base).map(String::from),
        }
    }
}

fn write_json(w: &mut impl Write, rows: &[AlertRow]) -> anyhow::Result<()> {
    for row in rows {
        serde_json::to_writer(&mut *w, row)?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

fn render_table(rows: &[AlertRow]) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.load_preset(comfy_table::presets::UTF8_HORIZONTAL_ONLY);
    table.set_header(["Time", "Visitor", "Camera", "Status", "Image"]);

    for row in rows {
        table.add_row([
            row.timestamp,
            row.visitor_id,
            row.cam_id,
            row.status,
            row.image_url.as_deref().unwrap_or_default(),
        ]);
    }
    table
}
