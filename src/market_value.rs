use thiserror::Error;
use tracing::debug;

use crate::state::PlayerRecord;

const CURRENCY_SYMBOLS: &[char] = &['€', '£', '$'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketValueError {
    #[error("empty market value")]
    Empty,
    #[error("no magnitude suffix in {0:?}")]
    MissingSuffix(String),
    #[error("malformed number in {0:?}")]
    Malformed(String),
}

/// Parses a display value such as `€1,50m` or `€500k` into millions.
///
/// Decimal commas are accepted. Values without an `m` or `k` suffix are
/// rejected rather than guessed at.
pub fn parse_market_value(raw: &str) -> Result<f64, MarketValueError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    if cleaned.is_empty() {
        return Err(MarketValueError::Empty);
    }

    let (digits, scale) = if let Some(rest) = cleaned.strip_suffix('m') {
        (rest, 1.0)
    } else if let Some(rest) = cleaned.strip_suffix("th.") {
        (rest, 0.001)
    } else if let Some(rest) = cleaned.strip_suffix('k') {
        (rest, 0.001)
    } else {
        return Err(MarketValueError::MissingSuffix(raw.to_string()));
    };

    let value = digits
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| MarketValueError::Malformed(raw.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(MarketValueError::Malformed(raw.to_string()));
    }
    Ok(value * scale)
}

/// Same as [`parse_market_value`] but unparseable values rank as zero.
pub fn market_value_millions(raw: &str) -> f64 {
    match parse_market_value(raw) {
        Ok(v) => v,
        Err(err) => {
            debug!(value = raw, %err, "market value unparseable, ranking as 0");
            0.0
        }
    }
}

/// Percentile of each value within the whole slice: the share of values
/// less than or equal to it, scaled to 0..=100 and rounded. Ties share.
pub fn percentile_ranks(values: &[f64]) -> Vec<u8> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    values
        .iter()
        .map(|v| {
            let at_or_below = sorted.partition_point(|x| x.total_cmp(v).is_le());
            let pct = (at_or_below as f64 / n as f64 * 100.0).round();
            pct.clamp(0.0, 100.0) as u8
        })
        .collect()
}

/// Assigns a percentile to every record, computed over the full batch.
pub fn rank_players(mut players: Vec<PlayerRecord>) -> Vec<PlayerRecord> {
    let values: Vec<f64> = players
        .iter()
        .map(|p| market_value_millions(&p.market_value))
        .collect();
    let ranks = percentile_ranks(&values);
    for (player, pct) in players.iter_mut().zip(ranks) {
        player.percentile = pct;
    }
    players
}

#[cfg(test)]
mod tests {
    use super::{parse_market_value, percentile_ranks, MarketValueError};

    #[test]
    fn parses_millions_with_decimal_comma() {
        let v = parse_market_value("€1,50m").expect("valid");
        assert!((v - 1.5).abs() < 1e-9);
    }

    #[test]
    fn parses_thousands_into_millions() {
        let v = parse_market_value("€500k").expect("valid");
        assert!((v - 0.5).abs() < 1e-9);
        let v = parse_market_value("€750 Th.").expect("valid");
        assert!((v - 0.75).abs() < 1e-9);
    }

    #[test]
    fn parses_decimal_point_and_uppercase() {
        let v = parse_market_value(" €12.00M ").expect("valid");
        assert!((v - 12.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_missing_suffix_and_garbage() {
        assert_eq!(parse_market_value(""), Err(MarketValueError::Empty));
        assert_eq!(parse_market_value("-"), Err(MarketValueError::MissingSuffix("-".into())));
        assert!(matches!(
            parse_market_value("€1000000"),
            Err(MarketValueError::MissingSuffix(_))
        ));
        assert!(matches!(
            parse_market_value("€abcm"),
            Err(MarketValueError::Malformed(_))
        ));
    }

    #[test]
    fn percentiles_share_ties() {
        let ranks = percentile_ranks(&[1.0, 2.0, 2.0, 4.0]);
        assert_eq!(ranks, vec![25, 75, 75, 100]);
    }

    #[test]
    fn percentile_halves_round_away_from_zero() {
        let values: Vec<f64> = (1..=8).map(f64::from).collect();
        let ranks = percentile_ranks(&values);
        assert_eq!(ranks, vec![13, 25, 38, 50, 63, 75, 88, 100]);
    }

    #[test]
    fn percentiles_empty_input() {
        assert!(percentile_ranks(&[]).is_empty());
    }
}
