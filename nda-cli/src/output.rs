//! Table output formats
//!
//! CSV mirrors the column layout of the instrument's own exports: the fixed
//! record columns first, then one V/T (and optionally t) column group per
//! auxiliary channel. Columns a format cannot supply stay empty. JSON is a
//! plain serde serialization of the rows.

use nda_decoder::{RecordRow, RecordTable};
use std::fmt::Display;
use std::io::Write;

const BASE_COLUMNS: &[&str] = &[
    "Index",
    "Cycle",
    "Step",
    "Status",
    "Time",
    "Voltage",
    "Current(mA)",
    "Charge_Capacity(mAh)",
    "Discharge_Capacity(mAh)",
    "Charge_Energy(mWh)",
    "Discharge_Energy(mWh)",
    "Timestamp",
];

pub fn write_csv(w: &mut impl Write, table: &RecordTable) -> std::io::Result<()> {
    let mut header: Vec<String> = BASE_COLUMNS.iter().map(|s| s.to_string()).collect();
    for ch in &table.aux_channels {
        header.push(format!("V{}", ch));
        header.push(format!("T{}", ch));
        if table.aux_has_time {
            header.push(format!("t{}", ch));
        }
    }
    writeln!(w, "{}", header.join(","))?;

    for row in &table.rows {
        write_csv_row(w, table, row)?;
    }
    Ok(())
}

fn write_csv_row(w: &mut impl Write, table: &RecordTable, row: &RecordRow) -> std::io::Result<()> {
    let mut fields: Vec<String> = vec![
        row.index.to_string(),
        opt(row.cycle),
        opt(row.step),
        opt(row.status),
        opt(row.time),
        row.voltage.to_string(),
        row.current.to_string(),
        opt(row.charge_capacity),
        opt(row.discharge_capacity),
        opt(row.charge_energy),
        opt(row.discharge_energy),
        row.timestamp
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
    ];
    for ch in &table.aux_channels {
        match row.aux.get(ch) {
            Some(reading) => {
                fields.push(reading.voltage.to_string());
                fields.push(reading.temperature.to_string());
                if table.aux_has_time {
                    fields.push(opt(reading.time));
                }
            }
            None => {
                fields.push(String::new());
                fields.push(String::new());
                if table.aux_has_time {
                    fields.push(String::new());
                }
            }
        }
    }
    writeln!(w, "{}", fields.join(","))
}

pub fn write_json(w: &mut impl Write, table: &RecordTable) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(w, &table.rows)
}

fn opt<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
