// src/export.rs
//! Выгрузка страницы данных в CSV или XLSX

use std::collections::HashMap;
use std::str::FromStr;

use actix_web::HttpResponse;
use chrono::DateTime;
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use strum::{AsRefStr, EnumString};

use crate::error::{ApiError, ApiResult};
use crate::models::value::{FieldValue, Record};
use crate::query_builders::utils::format_calendar_date;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ==================== ФОРМАТ ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &str {
        self.as_ref()
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => "application/ms-excel",
        }
    }
}

/// `exportType` из тела запроса: отсутствует -> 400, неизвестен -> UnsupportedExportFormat
pub fn parse_export_type(export_type: Option<&str>) -> ApiResult<ExportFormat> {
    let raw = export_type.ok_or_else(ApiError::missing_export_type)?;
    ExportFormat::from_str(raw).map_err(|_| {
        log::warn!("Rejected export type '{}'", raw);
        ApiError::UnsupportedExportFormat(raw.to_string())
    })
}

// ==================== ФАЙЛ ====================

#[derive(Debug, Clone)]
pub struct ExportFile {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
    pub format: ExportFormat,
}

impl ExportFile {
    pub fn into_response(self) -> HttpResponse {
        HttpResponse::Ok()
            .content_type(self.content_type)
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            ))
            .body(self.bytes)
    }
}

// ==================== ЗНАЧЕНИЯ ЯЧЕЕК ====================

/// Строковое представление ячейки
pub fn stringify(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => String::new(),
        FieldValue::List(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        FieldValue::Object(map) => {
            let date = map
                .get("$date")
                .and_then(Value::as_i64)
                .filter(|millis| *millis != 0)
                .and_then(DateTime::from_timestamp_millis);
            match date {
                Some(dt) => format_calendar_date(&dt),
                None => Value::Object(map.clone()).to_string(),
            }
        }
        FieldValue::DateTime(dt) => format_calendar_date(dt),
        FieldValue::Uuid(uuid) => uuid.hyphenated().to_string(),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::Integer(n) => n.to_string(),
        FieldValue::Float(n) => n.to_string(),
        FieldValue::Text(s) => s.clone(),
    }
}

// ==================== EXPORTER ====================

pub struct Exporter {
    rows: Vec<Record>,
    title_map: HashMap<String, String>,
    columns: Option<Vec<String>>,
    filename: String,
}

impl Exporter {
    pub fn new(rows: Vec<Record>, title_map: HashMap<String, String>) -> Self {
        Self {
            rows,
            title_map,
            columns: None,
            filename: "Export".to_string(),
        }
    }

    /// Колонки выгрузки в порядке объявления; без них берутся ключи первой строки
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_filename(mut self, filename: &str) -> Self {
        self.filename = filename.to_string();
        self
    }

    pub fn export(&self, format: ExportFormat) -> ApiResult<ExportFile> {
        let table = self.table();
        let bytes = match format {
            ExportFormat::Csv => write_csv(&table)?,
            ExportFormat::Xlsx => write_xlsx(&table)?,
        };

        log::debug!("Exported {} rows as {}", self.rows.len(), format.extension());

        Ok(ExportFile {
            bytes,
            content_type: format.content_type(),
            filename: format!("{}.{}", self.filename, format.extension()),
            format,
        })
    }

    /// Заголовок и строки ячеек. Пустая выгрузка не содержит и заголовка.
    fn table(&self) -> Vec<Vec<String>> {
        let first = match self.rows.first() {
            Some(first) => first,
            None => return Vec::new(),
        };

        let columns: Vec<String> = match &self.columns {
            Some(columns) => columns.clone(),
            None => first.keys().map(str::to_string).collect(),
        };

        let mut table = Vec::with_capacity(self.rows.len() + 1);
        table.push(
            columns
                .iter()
                .map(|c| self.title_map.get(c).cloned().unwrap_or_else(|| c.clone()))
                .collect(),
        );
        for row in &self.rows {
            table.push(
                columns
                    .iter()
                    .map(|c| row.get(c).map(stringify).unwrap_or_default())
                    .collect(),
            );
        }
        table
    }
}

fn write_csv(table: &[Vec<String>]) -> ApiResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    for record in table {
        writer.write_record(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| ApiError::InternalServerError(format!("CSV export failed: {}", e)))
}

fn write_xlsx(table: &[Vec<String>]) -> ApiResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (row, record) in table.iter().enumerate() {
        for (col, cell) in record.iter().enumerate() {
            worksheet.write_string(row as u32, col as u16, cell)?;
        }
    }
    Ok(workbook.save_to_buffer()?)
}

// ==================== ТЕСТЫ ====================
