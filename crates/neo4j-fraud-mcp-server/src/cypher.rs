//! Conservative read/write classification of Cypher text.
//!
//! This is a structural scan, not a parser: a query that cannot be positively
//! shown to be read-only is treated as a write. False positives on exotic
//! read-only queries are acceptable; a silent pass of a write query is not.

/// Write clause tokens. The trailing space prevents matching identifiers like
/// `CREATED_AT` inside property names.
const WRITE_KEYWORDS: &[&str] = &[
    "CREATE ",
    "MERGE ",
    "DELETE ",
    "REMOVE ",
    "SET ",
    "DROP ",
    "DETACH DELETE",
    // CALL subquery blocks may contain writes
    "CALL {",
];

/// Administrative and schema commands, matched as statement prefixes.
const ADMIN_PREFIXES: &[&str] = &[
    "SHOW",
    "CREATE INDEX",
    "CREATE CONSTRAINT",
    "ALTER",
    "GRANT",
    "DENY",
    "REVOKE",
    "TERMINATE",
];

/// Returns true when the query is not provably read-only.
pub fn is_write_query(text: &str) -> bool {
    let normalized = text.trim().to_uppercase();

    if ADMIN_PREFIXES
        .iter()
        .any(|prefix| normalized.starts_with(prefix))
    {
        return true;
    }

    WRITE_KEYWORDS
        .iter()
        .any(|keyword| normalized.contains(keyword))
}

/// Returns the first write keyword found in the query, for error messages.
pub fn detect_write_keyword(text: &str) -> Option<&'static str> {
    let normalized = text.trim().to_uppercase();

    ADMIN_PREFIXES
        .iter()
        .find(|prefix| normalized.starts_with(*prefix))
        .or_else(|| {
            WRITE_KEYWORDS
                .iter()
                .find(|keyword| normalized.contains(*keyword))
        })
        .copied()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("MATCH (n) RETURN n")]
    #[case("  match (c:Customer) return c.customerId  ")]
    #[case("MATCH (a)-[r:TRANSACTION]->(b) WHERE r.amount > 1000 RETURN a, b")]
    #[case("MATCH (n) RETURN count(n) as nodeCount")]
    #[case("CALL db.schema.visualization()")]
    fn read_queries_are_not_writes(#[case] query: &str) {
        assert!(!is_write_query(query));
    }

    #[rstest]
    #[case("CREATE (n:Customer {customerId: 'CUS1'})")]
    #[case("MATCH (n) SET n.x = 1 RETURN n")]
    #[case("merge (n:Email {address: 'a@b.c'})")]
    #[case("MATCH (n) DETACH DELETE n")]
    #[case("MATCH (n) REMOVE n.flag RETURN n")]
    #[case("DROP CONSTRAINT customer_id")]
    #[case("CALL { CREATE (n) } IN TRANSACTIONS")]
    fn write_queries_are_writes(#[case] query: &str) {
        assert!(is_write_query(query));
    }

    #[rstest]
    #[case("SHOW PROCEDURES")]
    #[case("show indexes")]
    #[case("CREATE INDEX customer_idx FOR (c:Customer) ON (c.customerId)")]
    #[case("CREATE CONSTRAINT FOR (c:Customer) REQUIRE c.customerId IS UNIQUE")]
    fn admin_commands_are_non_read(#[case] query: &str) {
        assert!(is_write_query(query));
    }

    #[test]
    fn property_names_containing_keywords_do_not_trip_the_scan() {
        assert!(!is_write_query(
            "MATCH (n) WHERE n.createdAt > 0 RETURN n.settlementDate"
        ));
    }

    #[test]
    fn classification_is_stateless() {
        let query = "MATCH (n) SET n.x = 1";
        assert_eq!(is_write_query(query), is_write_query(query));
    }

    #[test]
    fn detect_write_keyword_reports_the_offending_token() {
        assert_eq!(
            detect_write_keyword("MATCH (n) SET n.x = 1 RETURN n"),
            Some("SET ")
        );
        assert_eq!(detect_write_keyword("MATCH (n) RETURN n"), None);
    }
}
