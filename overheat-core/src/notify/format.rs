use super::NotifyMessage;
use crate::{classify::AlertKind, classify::Thresholds, record::AlertEvent};
use itertools::Itertools;
use std::fmt::Display;

const OVERHEAT_ADVICE: &str = "Recommendation: the market may be overheating and the risk of a \
short-term pullback is elevated. Consider trimming exposure or setting take-profit and risk limits.";

const OVERSOLD_ADVICE: &str = "Recommendation: sentiment is weak or oversold. Long-term investors \
may consider accumulating in tranches; short-term volatility risk remains high.";

impl AlertKind {
    pub fn marker(&self) -> &'static str {
        match self {
            AlertKind::Overheat => "⚠️",
            AlertKind::Oversold => "🔔",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            AlertKind::Overheat => OVERHEAT_ADVICE,
            AlertKind::Oversold => OVERSOLD_ADVICE,
        }
    }
}

fn or_na<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "n/a".to_string(), |value| value.to_string())
}

/// Short title distinguishing asset and direction, eg/ "⚠️ BTC Overheat Alert".
pub fn title(event: &AlertEvent) -> String {
    format!(
        "{} {} {} Alert",
        event.kind.marker(),
        event.record.symbol,
        event.kind
    )
}

/// Detailed multi-line body.
pub fn body(event: &AlertEvent, thresholds: &Thresholds) -> String {
    let record = &event.record;

    let metrics = record
        .metrics
        .iter()
        .map(|(metric, value)| format!("  - {metric}: {value}"))
        .join("\n");

    let z = record
        .score
        .z
        .iter()
        .map(|(metric, z)| format!("  - {metric}: {z:+.3}"))
        .join("\n");

    [
        title(event),
        format!("Time: {}", record.time.format("%Y-%m-%d %H:%M:%S UTC")),
        format!("Asset: {}", record.symbol),
        format!("Price (USD): {}", or_na(record.price)),
        format!("24h change (%): {}", or_na(record.price_change_24h_pct)),
        format!(
            "Overheat Score: {:.1} (thresholds: >= {} overheat; <= {} oversold)",
            record.score.score, thresholds.overheat, thresholds.oversold
        ),
        String::new(),
        "Raw metrics:".to_string(),
        metrics,
        String::new(),
        "Contribution (z-score):".to_string(),
        z,
        String::new(),
        event.kind.advice().to_string(),
    ]
    .join("\n")
}

pub fn render(event: &AlertEvent, thresholds: &Thresholds) -> NotifyMessage {
    NotifyMessage {
        title: title(event),
        body: body(event, thresholds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::tests::event;

    #[test]
    fn test_title() {
        let overheat = title(&event("BTC", AlertKind::Overheat, 80.0));
        let oversold = title(&event("ETH", AlertKind::Oversold, 12.0));

        assert_eq!(overheat, "⚠️ BTC Overheat Alert");
        assert_eq!(oversold, "🔔 ETH Oversold Alert");
        assert!(overheat.chars().count() < 40);
    }

    #[test]
    fn test_body_sections_in_order() {
        let body = body(&event("BTC", AlertKind::Overheat, 72.34), &Thresholds::default());
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines[0], "⚠️ BTC Overheat Alert");
        assert_eq!(lines[1], "Time: 2023-11-14 22:13:20 UTC");
        assert_eq!(lines[2], "Asset: BTC");
        assert_eq!(lines[3], "Price (USD): 67000.5");
        assert_eq!(lines[4], "24h change (%): 3.25");
        assert_eq!(
            lines[5],
            "Overheat Score: 72.3 (thresholds: >= 60 overheat; <= 30 oversold)"
        );
        assert_eq!(lines[7], "Raw metrics:");
        assert_eq!(lines[8], "  - etf_netflow: 1");
        assert_eq!(lines[13], "  - reserve_change_pct: 1");
        assert_eq!(lines[15], "Contribution (z-score):");
        assert_eq!(lines[16], "  - etf_netflow: +0.500");
        assert_eq!(lines[21], "  - reserve_change_pct: +0.500");
        assert_eq!(lines[23], OVERHEAT_ADVICE);
        assert_eq!(lines.len(), 24);
    }

    #[test]
    fn test_body_unknown_price_and_negative_z() {
        let mut alert = event("ETH", AlertKind::Oversold, 5.0);
        alert.record.price = None;
        alert.record.price_change_24h_pct = None;
        alert
            .record
            .score
            .z
            .insert(crate::metric::Metric::FundingRate, -1.23456);

        let body = body(&alert, &Thresholds::default());

        assert!(body.contains("Price (USD): n/a"));
        assert!(body.contains("24h change (%): n/a"));
        assert!(body.contains("  - funding_rate: -1.235"));
        assert!(body.ends_with(OVERSOLD_ADVICE));
    }
}
