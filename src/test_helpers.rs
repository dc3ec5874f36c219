//! Shared test fixtures: a seeded category store and sample content items.

use std::fs;
use std::path::Path;

use crate::store::{Category, CategoryStore, Comparison, Faq, FeatureRow, GlossaryTerm, SideLists};

/// A glossary term with enough structure to exercise rendering and
/// validation paths: markdown body, three FAQs, one keyword.
pub fn sample_term(slug: &str, category: &str) -> GlossaryTerm {
    let title = slug
        .split('-')
        .map(|w| {
            let mut c = w.chars();
            match c.next() {
                Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    GlossaryTerm {
        term: title.clone(),
        slug: slug.to_string(),
        category: category.to_string(),
        short_definition: format!("{title} is a building block of the modern data stack."),
        full_definition: format!(
            "{title} is a core concept in data engineering.\n\n\
             ## How it works\n\n\
             Teams adopt {title} to decouple storage from compute and keep \
             raw data queryable. It integrates with Airflow for orchestration \
             and with dbt for transformation.\n\n\
             ## Trade-offs\n\n\
             Like any architecture choice, {title} trades simplicity for \
             flexibility."
        ),
        key_points: vec![
            "Separates storage and compute".to_string(),
            "Works with open file formats".to_string(),
        ],
        faqs: vec![
            Faq {
                question: format!("What is {title}?"),
                answer: "A foundational data architecture pattern.".to_string(),
            },
            Faq {
                question: format!("When should I use {title}?"),
                answer: "When raw, varied data must stay cheap to keep.".to_string(),
            },
            Faq {
                question: format!("Is {title} expensive?"),
                answer: "Object storage keeps the cost low.".to_string(),
            },
        ],
        related_terms: Vec::new(),
        related_tools: vec!["Snowflake".to_string()],
        external_links: Vec::new(),
        keywords: vec![title.to_lowercase()],
        last_updated: Some("2026-01-15".to_string()),
    }
}

/// A comparison with a feature table, pros/cons, and three FAQs.
pub fn sample_comparison(slug: &str, category: &str) -> Comparison {
    Comparison {
        slug: slug.to_string(),
        tool_a: "Apache Airflow".to_string(),
        tool_b: "Prefect".to_string(),
        category: category.to_string(),
        winner: Some("It Depends".to_string()),
        short_verdict: "Airflow for maturity, Prefect for developer experience.".to_string(),
        intro: "Both orchestrate data pipelines; they differ in scheduling \
                model and operational overhead."
            .to_string(),
        features: vec![
            FeatureRow {
                feature: "Scheduling".to_string(),
                tool_a_value: "Interval-based".to_string(),
                tool_b_value: "Event-driven".to_string(),
                winner: Some("Prefect".to_string()),
            },
            FeatureRow {
                feature: "Community".to_string(),
                tool_a_value: "Huge".to_string(),
                tool_b_value: "Growing".to_string(),
                winner: Some("Apache Airflow".to_string()),
            },
        ],
        pros: SideLists {
            tool_a: vec!["Battle-tested at scale".to_string()],
            tool_b: vec!["Fast local iteration".to_string()],
        },
        cons: SideLists {
            tool_a: vec!["Scheduling latency".to_string()],
            tool_b: vec!["Smaller ecosystem".to_string()],
        },
        final_verdict: "Pick Airflow for a large platform team, Prefect for a \
                        small one moving fast."
            .to_string(),
        faqs: vec![
            Faq {
                question: "Can they run the same DAGs?".to_string(),
                answer: "No, the workflow definitions are incompatible.".to_string(),
            },
            Faq {
                question: "Which is easier to self-host?".to_string(),
                answer: "Prefect has fewer moving parts.".to_string(),
            },
            Faq {
                question: "Do both support retries?".to_string(),
                answer: "Yes, with different configuration models.".to_string(),
            },
        ],
        keywords: vec!["orchestration".to_string()],
        last_updated: Some("2026-02-01".to_string()),
    }
}

/// Seed a store with three categories, three glossary terms across two
/// shards, and one comparison.
pub fn seed_store(root: &Path) -> CategoryStore {
    let store = CategoryStore::new(root);

    let categories = vec![
        Category {
            id: "data-warehousing".to_string(),
            name: "Data Warehousing".to_string(),
            icon: None,
            description: None,
        },
        Category {
            id: "etl-elt".to_string(),
            name: "ETL & ELT".to_string(),
            icon: None,
            description: None,
        },
        Category {
            id: "data-orchestration".to_string(),
            name: "Data Orchestration".to_string(),
            icon: None,
            description: None,
        },
    ];
    fs::write(
        root.join("categories.json"),
        serde_json::to_string_pretty(&categories).unwrap(),
    )
    .unwrap();

    fs::create_dir_all(root.join("glossary")).unwrap();
    fs::create_dir_all(root.join("comparisons")).unwrap();

    let warehousing = vec![
        sample_term("data-lake", "data-warehousing"),
        sample_term("data-warehouse", "data-warehousing"),
    ];
    fs::write(
        root.join("glossary/data-warehousing.json"),
        serde_json::to_string_pretty(&warehousing).unwrap(),
    )
    .unwrap();

    let etl = vec![sample_term("reverse-etl", "etl-elt")];
    fs::write(
        root.join("glossary/etl-elt.json"),
        serde_json::to_string_pretty(&etl).unwrap(),
    )
    .unwrap();

    let comparisons = vec![sample_comparison("airflow-vs-prefect", "data-orchestration")];
    fs::write(
        root.join("comparisons/data-orchestration.json"),
        serde_json::to_string_pretty(&comparisons).unwrap(),
    )
    .unwrap();

    store
}
