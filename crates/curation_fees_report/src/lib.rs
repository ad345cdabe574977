//! CSV payout files and per-curation audit exports.

use curation_fees::{payout_rows, CuratorFeesSummary, FeeError, PayoutConfig, PayoutRow};
use rust_decimal::Decimal;
use std::io::Write;
use std::path::Path;

pub const PAYOUT_HEADER: &str = "token_type,token_address,receiver,amount";
pub const AUDIT_HEADER: &str = concat!(
    "curator,curator_name,timestamp,transaction_hash,collection_id,collection_name,",
    "item_id,item_name,creation_fee,curator_fee,duplicate"
);

/// Render the payout CSV: one header row, one row per curator.
pub fn build_payout_csv(
    summaries: &[CuratorFeesSummary],
    config: &PayoutConfig,
) -> Result<String, ReportError> {
    let rows = payout_rows(summaries, config).map_err(ReportError::Fee)?;
    Ok(render_payout_rows(&rows))
}

pub fn render_payout_rows(rows: &[PayoutRow]) -> String {
    let mut out = String::from(PAYOUT_HEADER);
    out.push('\n');
    for row in rows {
        let cells = [
            escape_csv(&row.token_type),
            escape_csv(&row.token_address),
            escape_csv(&row.receiver),
            escape_csv(&row.amount),
        ];
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

/// Render every curation detail, duplicates included, grouped by curator.
pub fn build_audit_csv(summaries: &[CuratorFeesSummary]) -> String {
    let mut out = String::from(AUDIT_HEADER);
    out.push('\n');
    for s in summaries {
        for d in &s.curations {
            let cells = [
                escape_csv(&s.curator_id),
                escape_csv(&s.name),
                d.timestamp.to_string(),
                escape_csv(&d.transaction_hash),
                escape_csv(&d.collection_id),
                escape_csv(d.collection_name.as_deref().unwrap_or_default()),
                escape_csv(d.item_id.as_deref().unwrap_or_default()),
                escape_csv(d.item_name.as_deref().unwrap_or_default()),
                format_amount(d.creation_fee),
                format_amount(d.curator_fee),
                d.duplicate.to_string(),
            ];
            out.push_str(&cells.join(","));
            out.push('\n');
        }
    }
    out
}

pub fn write_payout_csv(
    summaries: &[CuratorFeesSummary],
    config: &PayoutConfig,
    out_path: impl AsRef<Path>,
) -> Result<(), ReportError> {
    let csv = build_payout_csv(summaries, config)?;
    write_file(out_path.as_ref(), &csv)
}

pub fn write_audit_csv(
    summaries: &[CuratorFeesSummary],
    out_path: impl AsRef<Path>,
) -> Result<(), ReportError> {
    write_file(out_path.as_ref(), &build_audit_csv(summaries))
}

fn write_file(path: &Path, content: &str) -> Result<(), ReportError> {
    let mut f = std::fs::File::create(path).map_err(ReportError::Io)?;
    f.write_all(content.as_bytes()).map_err(ReportError::Io)?;
    Ok(())
}

fn format_amount(d: Decimal) -> String {
    d.normalize().to_string()
}

fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[derive(Debug)]
pub enum ReportError {
    Io(std::io::Error),
    Fee(FeeError),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "io: {}", e),
            ReportError::Fee(e) => write!(f, "fee: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}

#[cfg(test)]
mod tests {
    use super::*;
    use curation_fees::CurationDetail;

    fn summary() -> CuratorFeesSummary {
        let detail = |t: i64, fee: Decimal, duplicate: bool| CurationDetail {
            curator: "0xu1".into(),
            timestamp: t,
            transaction_hash: format!("0x{t}"),
            collection_id: "0xc".into(),
            collection_name: Some("Cats, Dogs".into()),
            item_id: Some("7".into()),
            item_name: Some("Say \"hi\"".into()),
            creation_fee: fee * Decimal::from(3),
            curator_fee: if duplicate { Decimal::ZERO } else { fee },
            duplicate,
        };
        CuratorFeesSummary {
            curator_id: "0xu1".into(),
            name: "Alice".into(),
            payment_address: "0xpay".into(),
            total_fees: Decimal::new(15, 1),
            curation_count: 2,
            curations: vec![
                detail(100, Decimal::new(15, 1), false),
                detail(200, Decimal::new(15, 1), true),
            ],
        }
    }

    #[test]
    fn payout_csv_layout() {
        let config = PayoutConfig {
            token_address: "0xtoken".into(),
        };
        let csv = build_payout_csv(&[summary()], &config).unwrap();
        assert_eq!(
            csv,
            "token_type,token_address,receiver,amount\nerc20,0xtoken,0xpay,1500000000000000000\n"
        );
    }

    #[test]
    fn empty_payout_is_header_only() {
        let config = PayoutConfig {
            token_address: "0xtoken".into(),
        };
        assert_eq!(
            build_payout_csv(&[], &config).unwrap(),
            format!("{}\n", PAYOUT_HEADER)
        );
    }

    #[test]
    fn audit_csv_escapes_and_keeps_duplicates() {
        let csv = build_audit_csv(&[summary()]);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], AUDIT_HEADER);
        assert!(lines[1].contains("\"Cats, Dogs\""));
        assert!(lines[1].contains("\"Say \"\"hi\"\"\""));
        assert!(lines[1].ends_with(",4.5,1.5,false"));
        assert!(lines[2].contains(",0x200,0xc,"));
        assert!(lines[2].ends_with(",4.5,0,true"));
    }

    #[test]
    fn write_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.csv");
        write_audit_csv(&[summary()], &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with(AUDIT_HEADER));
    }
}
