//! Export-tjänst för att exportera filtrerade rader (XLSX, CSV, JSON)

use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::db::Database;
use crate::models::{Asset, ElectricityLog, PettyCashTransaction, TravelLog, WaterLog};
use crate::services::aggregator::{PeriodEntry, PeriodFilter};
use crate::utils::date::format_date;

/// Exportformat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "Excel",
            ExportFormat::Csv => "CSV",
            ExportFormat::Json => "JSON",
        }
    }
}

/// Typ av rapport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Water,
    Electricity,
    Travel,
    Assets,
    PettyCash,
}

impl ReportType {
    pub fn display_name(&self) -> &'static str {
        match self {
            ReportType::Water => "Vatten",
            ReportType::Electricity => "El",
            ReportType::Travel => "Resor",
            ReportType::Assets => "Tillgångar",
            ReportType::PettyCash => "Småkassa",
        }
    }

    pub fn filename_prefix(&self) -> &'static str {
        match self {
            ReportType::Water => "vatten",
            ReportType::Electricity => "el",
            ReportType::Travel => "resor",
            ReportType::Assets => "tillgangar",
            ReportType::PettyCash => "smakassa",
        }
    }
}

/// Ett cellvärde i en exporterad tabell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    fn optional(value: Option<&str>) -> Self {
        value.map_or(Cell::Empty, Cell::text)
    }

    fn number(value: f64) -> Self {
        if value.is_finite() {
            Cell::Number(value)
        } else {
            Cell::Empty
        }
    }

    fn as_csv(&self) -> String {
        match self {
            Cell::Text(s) => csv_escape(s),
            Cell::Number(n) => n.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

/// Rad som kan skrivas som tabell
pub trait Tabular {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<Cell>;
}

impl Tabular for WaterLog {
    fn headers() -> &'static [&'static str] {
        &["date", "headcount", "is_holiday", "water_liters", "carbon_kg", "cost", "notes"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::text(format_date(self.date)),
            Cell::number(self.headcount as f64),
            Cell::text(if self.is_holiday { "ja" } else { "nej" }),
            Cell::number(self.water_liters),
            Cell::number(self.carbon_kg),
            Cell::number(self.cost),
            Cell::optional(self.notes.as_deref()),
        ]
    }
}

impl Tabular for ElectricityLog {
    fn headers() -> &'static [&'static str] {
        &[
            "start_date",
            "end_date",
            "building_kwh",
            "allocation_percentage",
            "company_kwh",
            "emission_factor_per_kwh",
            "carbon_kg",
            "cost",
            "notes",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::text(format_date(self.start_date)),
            Cell::text(format_date(self.end_date)),
            Cell::number(self.building_kwh),
            Cell::number(self.config.allocation_percentage),
            Cell::number(self.company_kwh),
            Cell::number(self.config.emission_factor_per_kwh),
            Cell::number(self.carbon_kg),
            Cell::number(self.cost),
            Cell::optional(self.notes.as_deref()),
        ]
    }
}

impl Tabular for TravelLog {
    fn headers() -> &'static [&'static str] {
        &[
            "travel_date",
            "activity_id",
            "origin",
            "destination",
            "transport_mode",
            "transport_subtype",
            "distance_km",
            "passenger_count",
            "emission_factor_per_km",
            "emission_kg",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::text(format_date(self.travel_date)),
            Cell::number(self.activity_id as f64),
            Cell::optional(self.origin.as_deref()),
            Cell::optional(self.destination.as_deref()),
            Cell::text(self.transport_mode.to_string()),
            Cell::optional(self.transport_subtype.as_deref()),
            Cell::number(self.distance_km),
            Cell::number(self.passenger_count as f64),
            Cell::number(self.emission_factor_per_km),
            Cell::number(self.emission_kg),
        ]
    }
}

impl Tabular for Asset {
    fn headers() -> &'static [&'static str] {
        &[
            "code",
            "name",
            "category",
            "condition",
            "status",
            "location",
            "purchase_value",
            "current_value",
            "current_holder_id",
        ]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::text(self.code.clone()),
            Cell::text(self.name.clone()),
            Cell::text(self.category.clone()),
            Cell::text(self.condition.to_string()),
            Cell::text(self.status.to_string()),
            Cell::optional(self.location.as_deref()),
            Cell::number(self.purchase_value),
            Cell::number(self.current_value),
            self.current_holder_id
                .map_or(Cell::Empty, |id| Cell::number(id as f64)),
        ]
    }
}

impl Tabular for PettyCashTransaction {
    fn headers() -> &'static [&'static str] {
        &["date", "kind", "amount", "category", "description"]
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::text(format_date(self.date)),
            Cell::text(self.kind.to_string()),
            Cell::number(self.signed_amount()),
            Cell::text(self.category.clone()),
            Cell::optional(self.description.as_deref()),
        ]
    }
}

/// Export-tjänst
pub struct ExportService<'a> {
    db: &'a Database,
}

impl<'a> ExportService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Generera filnamn för export
    pub fn generate_filename(report_type: ReportType, format: ExportFormat) -> String {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        format!(
            "opsboard_{}_{}.{}",
            report_type.filename_prefix(),
            timestamp,
            format.extension()
        )
    }

    /// Hämta rapportens rader, filtrera på period och skriv till fil.
    /// Tillgångar saknar datum och filtreras inte.
    pub fn export_report(
        &self,
        report_type: ReportType,
        format: ExportFormat,
        filter: &PeriodFilter,
        path: &Path,
    ) -> Result<ExportResult> {
        let sheet = report_type.display_name();

        let (row_count, file_size) = match report_type {
            ReportType::Water => {
                let rows = filtered(self.db.water().find_all_logs()?, filter);
                write_rows(&rows, format, sheet, path)?
            }
            ReportType::Electricity => {
                let rows = filtered(self.db.electricity().find_all()?, filter);
                write_rows(&rows, format, sheet, path)?
            }
            ReportType::Travel => {
                let rows = filtered(self.db.travel().find_all_logs()?, filter);
                write_rows(&rows, format, sheet, path)?
            }
            ReportType::Assets => {
                let rows = self.db.assets().find_all()?;
                write_rows(&rows, format, sheet, path)?
            }
            ReportType::PettyCash => {
                let rows = filtered(self.db.petty_cash().find_all()?, filter);
                write_rows(&rows, format, sheet, path)?
            }
        };

        tracing::info!(
            "Exporterade {} ({}) till {}",
            report_type.display_name(),
            format.display_name(),
            path.display()
        );

        Ok(ExportResult {
            report_type,
            format,
            row_count,
            file_size,
        })
    }
}

fn filtered<T: PeriodEntry>(rows: Vec<T>, filter: &PeriodFilter) -> Vec<T> {
    rows.into_iter()
        .filter(|row| filter.contains(row.period_date()))
        .collect()
}

/// Skriv en redan filtrerad samling till fil. Returnerar (rader, bytes).
pub fn write_rows<T: Tabular + Serialize>(
    rows: &[T],
    format: ExportFormat,
    sheet_name: &str,
    path: &Path,
) -> Result<(usize, u64)> {
    match format {
        ExportFormat::Xlsx => {
            let file = File::create(path).context("Kunde inte skapa exportfil")?;
            write_xlsx(rows, sheet_name, file)?;
        }
        ExportFormat::Csv => {
            fs::write(path, to_csv(rows)).context("Kunde inte skriva fil")?;
        }
        ExportFormat::Json => {
            let json = serde_json::to_string_pretty(rows).context("JSON serialisering misslyckades")?;
            fs::write(path, json).context("Kunde inte skriva fil")?;
        }
    }

    let metadata = fs::metadata(path)?;
    Ok((rows.len(), metadata.len()))
}

/// Rader som CSV med rubrikrad
pub fn to_csv<T: Tabular>(rows: &[T]) -> String {
    let mut csv = String::new();
    csv.push_str(&T::headers().join(","));
    csv.push('\n');

    for row in rows {
        let line: Vec<String> = row.cells().iter().map(Cell::as_csv).collect();
        csv.push_str(&line.join(","));
        csv.push('\n');
    }

    csv
}

/// Escape CSV-värde
pub fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;

/// Skriv en arbetsbok med ett blad. Text skrivs som inline-strängar,
/// så ingen delad strängtabell behövs.
pub fn write_xlsx<T: Tabular, W: Write + Seek>(rows: &[T], sheet_name: &str, writer: W) -> Result<()> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(6));

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES.as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(ROOT_RELS.as_bytes())?;

    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(workbook_xml(sheet_name).as_bytes())?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(WORKBOOK_RELS.as_bytes())?;

    zip.start_file("xl/worksheets/sheet1.xml", options)?;
    zip.write_all(sheet_xml(rows).as_bytes())?;

    zip.finish().context("Kunde inte avsluta XLSX-fil")?;
    Ok(())
}

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
        xml_escape(&sheet_title(sheet_name))
    )
}

fn sheet_xml<T: Tabular>(rows: &[T]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    let header: Vec<Cell> = T::headers().iter().map(|h| Cell::text(*h)).collect();
    push_row(&mut xml, 1, &header);

    for (i, row) in rows.iter().enumerate() {
        push_row(&mut xml, i + 2, &row.cells());
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn push_row(xml: &mut String, row_number: usize, cells: &[Cell]) {
    xml.push_str(&format!(r#"<row r="{}">"#, row_number));
    for (col, cell) in cells.iter().enumerate() {
        let reference = format!("{}{}", column_name(col), row_number);
        match cell {
            Cell::Text(s) => xml.push_str(&format!(
                r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                reference,
                xml_escape(s)
            )),
            Cell::Number(n) => {
                xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n))
            }
            Cell::Empty => {}
        }
    }
    xml.push_str("</row>");
}

/// Kolumnbokstav: 0 -> A, 25 -> Z, 26 -> AA
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Bladnamn får vara högst 31 tecken och sakna vissa specialtecken
fn sheet_title(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if cleaned.is_empty() {
        "Blad1".to_string()
    } else {
        cleaned
    }
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

/// Resultat av export
#[derive(Debug)]
pub struct ExportResult {
    pub report_type: ReportType,
    pub format: ExportFormat,
    pub row_count: usize,
    pub file_size: u64,
}

impl ExportResult {
    pub fn summary(&self) -> String {
        format!(
            "{} exporterad: {} rader, {} bytes",
            self.report_type.display_name(),
            self.row_count,
            self.file_size
        )
    }
}
