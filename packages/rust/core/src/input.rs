//! Queue loader: reads the selection CSV into [`CandidateItem`]s.

use std::io::Read;
use std::path::Path;

use tracing::{debug, info, instrument};

use corpusfetch_shared::{CandidateItem, CorpusError, Result};

const COL_URL: &str = "URL";
const COL_TITLE: &str = "Title";
const COL_SOURCE_DOMAIN: &str = "Source_Domain";
const COL_CATEGORY: &str = "Category_Guess";
const COL_SCORE: &str = "Score";
const COL_STATUS: &str = "Status";
const COL_PUBLISH_DATE: &str = "Publish_Date";

/// Status value that marks a row for fetching.
const SELECTED: &str = "selected";

/// Column positions resolved from the header row.
struct Columns {
    url: usize,
    title: Option<usize>,
    source_domain: Option<usize>,
    category: Option<usize>,
    score: Option<usize>,
    status: Option<usize>,
    publish_date: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };

        let url = find(COL_URL)
            .ok_or_else(|| CorpusError::input(format!("missing required column `{COL_URL}`")))?;

        Ok(Self {
            url,
            title: find(COL_TITLE),
            source_domain: find(COL_SOURCE_DOMAIN),
            category: find(COL_CATEGORY),
            score: find(COL_SCORE),
            status: find(COL_STATUS),
            publish_date: find(COL_PUBLISH_DATE),
        })
    }
}

/// Load `Status == Selected` rows from the CSV at `path`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_candidates(path: &Path) -> Result<Vec<CandidateItem>> {
    let file = std::fs::File::open(path).map_err(|e| CorpusError::io(path, e))?;
    let items = read_candidates(file)?;
    info!(count = items.len(), "candidates loaded");
    Ok(items)
}

/// Parse candidates from any CSV reader.
pub fn read_candidates<R: Read>(reader: R) -> Result<Vec<CandidateItem>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| CorpusError::input(format!("unreadable header row: {e}")))?
        .clone();
    let cols = Columns::resolve(&headers)?;

    let mut items = Vec::new();
    let mut filtered = 0usize;

    for (line, record) in rdr.records().enumerate() {
        let record = record
            .map_err(|e| CorpusError::input(format!("unreadable row {}: {e}", line + 2)))?;
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        if cols.status.is_some() && !cell(cols.status).eq_ignore_ascii_case(SELECTED) {
            filtered += 1;
            continue;
        }

        items.push(CandidateItem {
            url: cell(Some(cols.url)),
            title: cell(cols.title),
            category: cell(cols.category),
            source_domain: cell(cols.source_domain),
            publish_date: cell(cols.publish_date),
            score: parse_score(&cell(cols.score)),
        });
    }

    debug!(kept = items.len(), filtered, "status filter applied");
    Ok(items)
}

/// Non-numeric and NaN scores count as missing.
fn parse_score(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|s| !s.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_rows_only() {
        let csv = "\
URL,Title,Source_Domain,Category_Guess,Score,Status,Publish_Date
http://example.com/a,A,example.com,X,0.9,Selected,2024-01-02
http://example.com/b,B,example.com,X,0.5,rejected,
http://example.com/c,C,example.com,Y,n/a, SELECTED ,
";
        let items = read_candidates(csv.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].url, "http://example.com/a");
        assert_eq!(items[0].category, "X");
        assert_eq!(items[0].score, Some(0.9));
        assert_eq!(items[0].publish_date, "2024-01-02");

        assert_eq!(items[1].url, "http://example.com/c");
        assert_eq!(items[1].score, None);
    }

    #[test]
    fn without_status_column_every_row_is_kept() {
        let csv = "URL,Title\nhttp://example.com/a,A\n,Empty\n";
        let items = read_candidates(csv.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].url, "");
        assert_eq!(items[1].title, "Empty");
        assert_eq!(items[0].category, "");
        assert_eq!(items[0].score, None);
    }

    #[test]
    fn missing_url_column_is_fatal() {
        let csv = "Link,Title\nhttp://example.com/a,A\n";
        let err = read_candidates(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, CorpusError::Input { .. }));
        assert!(err.to_string().contains("URL"));
    }

    #[test]
    fn short_rows_default_missing_cells() {
        let csv = "URL,Title,Category_Guess,Score\nhttp://example.com/a\n";
        let items = read_candidates(csv.as_bytes()).unwrap();
        assert_eq!(items[0].title, "");
        assert_eq!(items[0].category, "");
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let csv = "\u{feff}URL,Status\nhttp://example.com/a,selected\n";
        let items = read_candidates(csv.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_candidates(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, CorpusError::Io { .. }));
    }
}
