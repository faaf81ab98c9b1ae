//! The YAML tool catalog compiled into the binary. Paths keep their
//! `config/<category>/` prefix so category derivation works the same way for
//! embedded and on-disk descriptors.

pub(crate) const EMBEDDED_TOOL_CONFIGS: &[(&str, &str)] = &[
    (
        "config/bloom/generate-scene-action.yaml",
        include_str!("../../config/bloom/generate-scene-action.yaml"),
    ),
    (
        "config/bloom/generate-search-phrase.yaml",
        include_str!("../../config/bloom/generate-search-phrase.yaml"),
    ),
    (
        "config/fraud/analyze-first-party-fraud.yaml",
        include_str!("../../config/fraud/analyze-first-party-fraud.yaml"),
    ),
    (
        "config/fraud/detect-transaction-structuring.yaml",
        include_str!("../../config/fraud/detect-transaction-structuring.yaml"),
    ),
    (
        "config/fraud/detect-money-mule-networks.yaml",
        include_str!("../../config/fraud/detect-money-mule-networks.yaml"),
    ),
    (
        "config/graph-data/explore-transaction-network.yaml",
        include_str!("../../config/graph-data/explore-transaction-network.yaml"),
    ),
    (
        "config/graph-data/summarize-graph-statistics.yaml",
        include_str!("../../config/graph-data/summarize-graph-statistics.yaml"),
    ),
    (
        "config/liquidity/trace-fund-movement.yaml",
        include_str!("../../config/liquidity/trace-fund-movement.yaml"),
    ),
    (
        "config/sar/get-sar-report-guidance.yaml",
        include_str!("../../config/sar/get-sar-report-guidance.yaml"),
    ),
];
