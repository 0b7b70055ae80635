use std::io::Write;

use anyhow::Context;
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::statement::UserId;

/// One line of the final report.
#[derive(Debug, Serialize)]
pub struct BalanceRow {
    pub user: UserId,
    pub email: String,
    pub balance: Decimal,
    pub statements: usize,
}

/// Writes `rows` as headed CSV; the header comes from the field names of `T`.
pub fn write_rows<W, T>(output: W, rows: impl IntoIterator<Item = T>) -> anyhow::Result<()>
where
    W: Write,
    T: Serialize,
{
    let mut writer = Writer::from_writer(output);
    for (index, row) in rows.into_iter().enumerate() {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write report row {}", index + 1))?;
    }
    writer.flush().context("Failed to flush report")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_has_header_and_rows() {
        let user = UserId::new();
        let mut output = Vec::new();
        write_rows(
            &mut output,
            [BalanceRow {
                user,
                email: "user@example.com".to_string(),
                balance: Decimal::new(14975, 2),
                statements: 2,
            }],
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            format!("user,email,balance,statements\n{user},user@example.com,149.75,2\n")
        );
    }

    #[test]
    fn empty_report_is_empty() {
        let mut output = Vec::new();
        write_rows(&mut output, Vec::<BalanceRow>::new()).unwrap();
        assert!(output.is_empty());
    }
}
