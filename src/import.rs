use chrono::NaiveDate;
use csv::{StringRecord, StringRecordsIntoIter};

use crate::RawRow;

/// The column layouts transaction exports come in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CsvLayout {
    /// A header row names the columns `timestamp`, `company`, `type`, `amount`
    /// and optionally `description`, in any order
    #[default]
    Headed,
    /// The game's own export: no header, the columns are
    /// `Description, Day, Type, Amount, ID`
    GameExport,
}

impl CsvLayout {
    /// The date of game day `0` when none is configured
    ///
    /// Only the game's export counts days instead of writing timestamps.
    pub fn default_day_epoch(self) -> Option<NaiveDate> {
        match self {
            CsvLayout::Headed => None,
            CsvLayout::GameExport => NaiveDate::from_ymd_opt(1970, 1, 1),
        }
    }
}

impl std::str::FromStr for CsvLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "headed" => Ok(CsvLayout::Headed),
            "game-export" => Ok(CsvLayout::GameExport),
            other => Err(format!("unknown layout `{}`", other)),
        }
    }
}

/// Tokenizes CSV data into raw rows
///
/// Each item corresponds to one data row, so the position of an item is the
/// row index. Unreadable rows are yielded as errors and reading continues.
/// Header names are matched case-insensitively. A header row that can't be
/// read fails the whole read, since no row after it can be interpreted.
pub fn read_rows<R>(reader: R, layout: CsvLayout) -> Result<Rows<R>, csv::Error>
    where R: std::io::Read
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(layout == CsvLayout::Headed)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = match layout {
        CsvLayout::Headed => Some(
            reader.headers()?
                .iter()
                .map(str::to_lowercase)
                .collect::<StringRecord>()
        ),
        CsvLayout::GameExport => None,
    };

    Ok(Rows {
        records: reader.into_records(),
        headers,
    })
}

/// The iterator returned by [`read_rows`]
pub struct Rows<R> {
    records: StringRecordsIntoIter<R>,
    /// Lowercased, `None` for headerless layouts
    headers: Option<StringRecord>,
}

impl<R: std::io::Read> Iterator for Rows<R> {
    type Item = Result<RawRow, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.to_string())),
        };

        Some(match &self.headers {
            Some(headers) => record
                .deserialize::<RawRow>(Some(headers))
                .map_err(|e| e.to_string()),
            None => Ok(game_export_row(&record)),
        })
    }
}

fn game_export_row(record: &StringRecord) -> RawRow {
    let field = |index: usize| record.get(index).map(str::to_owned);
    RawRow {
        description: field(0),
        timestamp: field(1),
        kind: field(2),
        amount: field(3),
        company: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headed_columns_in_any_order() {
        let csv = r#"amount, type, timestamp, company, id
                     -50, Rent, 2024-01-01, Cafe, 7"#;
        let rows = read_rows(csv.as_bytes(), CsvLayout::Headed).unwrap().collect::<Vec<_>>();
        assert_eq!(rows, vec![Ok(RawRow {
            timestamp: Some("2024-01-01".to_owned()),
            company: Some("Cafe".to_owned()),
            kind: Some("Rent".to_owned()),
            amount: Some("-50".to_owned()),
            description: None,
        })]);
    }

    #[test]
    fn game_export_columns() {
        let csv = "\"Sold a necklace, Best Jewelery\", 14, Sale, 250.5, 1\n\
                   Paid rent, 15, Rent, -100, 2\n";
        let rows = read_rows(csv.as_bytes(), CsvLayout::GameExport)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description.as_deref(), Some("Sold a necklace, Best Jewelery"));
        assert_eq!(rows[0].timestamp.as_deref(), Some("14"));
        assert_eq!(rows[0].kind.as_deref(), Some("Sale"));
        assert_eq!(rows[0].amount.as_deref(), Some("250.5"));
        assert_eq!(rows[1].company, None);
    }

    #[test]
    fn unreadable_rows_do_not_stop_reading() {
        let csv = "Paid rent, 15, Rent, -100, 2\n\
                   short, 16\n\
                   Paid rent, 17, Rent, -100, 3\n";
        let rows = read_rows(csv.as_bytes(), CsvLayout::GameExport).unwrap().collect::<Vec<_>>();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_ok());
        assert!(rows[1].is_err());
        assert!(rows[2].is_ok());
    }

    #[test]
    fn header_names_ignore_case() {
        let csv = r#"Timestamp, COMPANY, Type, Amount
                     2024-01-01, Cafe, Rent, -50"#;
        let rows = read_rows(csv.as_bytes(), CsvLayout::Headed)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(rows[0].timestamp.as_deref(), Some("2024-01-01"));
        assert_eq!(rows[0].company.as_deref(), Some("Cafe"));
        assert_eq!(rows[0].kind.as_deref(), Some("Rent"));
        assert_eq!(rows[0].amount.as_deref(), Some("-50"));
    }

    #[test]
    fn unreadable_header_fails() {
        let csv: &[u8] = b"time\xffstamp, amount\n2024-01-01, 1\n";
        assert!(read_rows(csv, CsvLayout::Headed).is_err());
        assert!(read_rows(csv, CsvLayout::GameExport).is_ok());
    }

    #[test]
    fn only_game_exports_count_days() {
        assert_eq!(CsvLayout::Headed.default_day_epoch(), None);
        assert_eq!(CsvLayout::GameExport.default_day_epoch(), NaiveDate::from_ymd_opt(1970, 1, 1));
    }

    #[test]
    fn layout_names() {
        assert_eq!("headed".parse(), Ok(CsvLayout::Headed));
        assert_eq!("game-export".parse(), Ok(CsvLayout::GameExport));
        assert!("xlsx".parse::<CsvLayout>().is_err());
    }
}
