//! Fit-table and terminal formatting.
//!
//! The fit table keeps the layout downstream spreadsheets were built around:
//! every channel owns exactly three lines, two rows of `--` followed by the
//! data row
//!
//! ```text
//! constant,constant_error,exponent,exponent_error,chi_square,ndf,probability
//! ```
//!
//! Historical tables wrote nothing at all for a skipped channel, so every
//! later channel shifted up. Here a skipped channel gets a third `--` row in
//! place of the data row instead, and line `3 * (id - 1) + 2` (0-based) is
//! always channel `id`'s data slot.
//!
//! Numbers are printed like C's `%g` (6 significant digits) so regenerated
//! tables diff cleanly against historical ones.

use crate::domain::{ChannelFit, FitParams};
use crate::io::ingest::Ingested;

/// Sentinel written in every field of a placeholder row.
pub const PLACEHOLDER: &str = "--";
/// Fields per fit-table row.
pub const FIELD_COUNT: usize = 7;
/// Fit-table lines per channel.
pub const LINES_PER_CHANNEL: usize = 3;

const SIGNIFICANT_DIGITS: i32 = 6;

/// Format the whole fit table, in increasing channel order.
pub fn format_fit_table(fits: &[ChannelFit]) -> String {
    let mut ordered: Vec<&ChannelFit> = fits.iter().collect();
    ordered.sort_by_key(|f| f.channel_id());

    let mut out = String::new();
    for fit in ordered {
        for _ in 0..LINES_PER_CHANNEL - 1 {
            out.push_str(&placeholder_line());
            out.push('\n');
        }
        match fit.params() {
            Some(params) => out.push_str(&data_line(params)),
            None => out.push_str(&placeholder_line()),
        }
        out.push('\n');
    }
    out
}

pub fn placeholder_line() -> String {
    vec![PLACEHOLDER; FIELD_COUNT].join(",")
}

pub fn data_line(p: &FitParams) -> String {
    [
        fmt_g(p.constant),
        fmt_g(p.constant_error),
        fmt_g(p.exponent),
        fmt_g(p.exponent_error),
        fmt_g(p.chi_square),
        p.degrees_of_freedom.to_string(),
        fmt_g(p.fit_probability),
    ]
    .join(",")
}

/// Format `v` like C's `printf("%g", v)`.
pub fn fmt_g(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // The exponent is taken after rounding to the target precision.
    let sci = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, v);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= SIGNIFICANT_DIGITS {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.abs())
    } else {
        let decimals = (SIGNIFICANT_DIGITS - 1 - exp) as usize;
        trim_fraction(&format!("{v:.decimals$}"))
    }
}

fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

/// Format the terminal summary of a run.
pub fn format_run_summary(group: &str, ingested: &Ingested, fits: &[ChannelFit]) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== gainvoltage - {group} ===\n"));
    out.push_str(&format!(
        "Records: used={} dropped={}\n\n",
        ingested.rows_used(),
        ingested.dropped.len()
    ));

    out.push_str(
        format!(
            "{:<5} {:>12} {:>12} {:>10} {:>10} {:>12} {:>4} {:>12}",
            "pmt", "amplitude", "constant", "exponent", "exp_err", "chi2", "ndf", "prob"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<5} {:-<12} {:-<12} {:-<10} {:-<10} {:-<12} {:-<4} {:-<12}",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for fit in fits {
        let row = match fit {
            ChannelFit::Fitted { channel_id, params } => format!(
                "{:<5} {:>12} {:>12} {:>10} {:>10} {:>12} {:>4} {:>12}",
                channel_id,
                fmt_g(params.amplitude()),
                fmt_g(params.constant),
                fmt_g(params.exponent),
                fmt_g(params.exponent_error),
                fmt_g(params.chi_square),
                params.degrees_of_freedom,
                fmt_g(params.fit_probability),
            ),
            ChannelFit::Skipped { channel_id, reason } => {
                format!("{channel_id:<5} skipped: {reason}")
            }
        };
        out.push_str(row.trim_end());
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SkipReason;

    fn params(constant: f64, exponent: f64) -> FitParams {
        FitParams {
            constant,
            constant_error: 0.123456789,
            exponent,
            exponent_error: 0.0123,
            chi_square: 1.5,
            degrees_of_freedom: 4,
            fit_probability: 0.826641,
        }
    }

    #[test]
    fn fmt_g_matches_printf() {
        let cases = [
            (0.0, "0"),
            (7.0, "7"),
            (0.1, "0.1"),
            (-30.1234567, "-30.1235"),
            (123456.0, "123456"),
            (1234567.0, "1.23457e+06"),
            (999999.5, "1e+06"),
            (0.0001, "0.0001"),
            (0.00001234, "1.234e-05"),
            (1e100, "1e+100"),
            (-2.5e-7, "-2.5e-07"),
            (f64::NAN, "nan"),
            (f64::INFINITY, "inf"),
        ];
        for (v, expected) in cases {
            assert_eq!(fmt_g(v), expected, "v={v}");
        }
    }

    #[test]
    fn fitted_channel_is_two_placeholders_then_data() {
        let fits = vec![ChannelFit::Fitted {
            channel_id: 1,
            params: params(-11.5, 7.0),
        }];
        let table = format_fit_table(&fits);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "--,--,--,--,--,--,--");
        assert_eq!(lines[1], lines[0]);
        assert_eq!(lines[2], "-11.5,0.123457,7,0.0123,1.5,4,0.826641");
    }

    #[test]
    fn skipped_channel_keeps_its_slot() {
        let fits = vec![
            ChannelFit::Fitted {
                channel_id: 1,
                params: params(-11.5, 7.0),
            },
            ChannelFit::Skipped {
                channel_id: 2,
                reason: SkipReason::InvalidSampleSize { found: 4 },
            },
            ChannelFit::Fitted {
                channel_id: 3,
                params: params(-12.0, 7.5),
            },
        ];
        let table = format_fit_table(&fits);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3 * LINES_PER_CHANNEL);
        assert!(lines[3..6].iter().all(|l| *l == placeholder_line()));
        assert!(lines[8].starts_with("-12,"));
    }

    #[test]
    fn table_is_ordered_by_channel() {
        let fits = vec![
            ChannelFit::Fitted {
                channel_id: 2,
                params: params(-2.0, 2.0),
            },
            ChannelFit::Fitted {
                channel_id: 1,
                params: params(-1.0, 1.0),
            },
        ];
        let table = format_fit_table(&fits);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[2].starts_with("-1,"));
        assert!(lines[5].starts_with("-2,"));
    }

    #[test]
    fn summary_lists_every_channel() {
        let fits = vec![
            ChannelFit::Fitted {
                channel_id: 1,
                params: params(-11.5, 7.0),
            },
            ChannelFit::Skipped {
                channel_id: 2,
                reason: SkipReason::InvalidSampleSize { found: 0 },
            },
        ];
        let summary = format_run_summary("A1", &Ingested::default(), &fits);
        assert!(summary.contains("=== gainvoltage - A1 ==="));
        assert!(summary.contains("skipped: expected 3 or 6 data points, found 0"));
        assert!(summary.lines().all(|l| l == l.trim_end()));
    }
}
