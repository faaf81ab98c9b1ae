use super::types::{AttributeMapping, Direction, PathSpecification};

/// Builds OPTIONAL MATCH clauses without hardcoding relationship names or
/// node labels. Generated variables are numbered per builder instance.
#[derive(Default)]
pub struct OptionalMatchBuilder {
    clauses: Vec<String>,
    var_counter: usize,
}

impl OptionalMatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an OPTIONAL MATCH clause for an attribute relationship and
    /// returns the generated variable name for use in later clauses.
    ///
    /// `add_attribute_match("c", &mapping)` with relationship HAS_EMAIL and
    /// label Email generates `OPTIONAL MATCH (c)-[:HAS_EMAIL]->(attr0:Email)`
    /// and returns `attr0`.
    pub fn add_attribute_match(&mut self, source_var: &str, mapping: &AttributeMapping) -> String {
        let var_name = format!("attr{}", self.var_counter);
        self.var_counter += 1;

        self.clauses.push(format!(
            "OPTIONAL MATCH ({})-[:{}]->({}:{})",
            source_var, mapping.relationship_type, var_name, mapping.target_label
        ));
        var_name
    }

    /// Appends an OPTIONAL MATCH clause for a path traversal and returns the
    /// generated variable name of the end node.
    pub fn add_path_match(&mut self, source_var: &str, path: &PathSpecification) -> String {
        let var_name = format!("path{}", self.var_counter);
        self.var_counter += 1;

        let hop_spec = render_hop_spec(path.min_hops, path.max_hops);

        let clause = match path.direction {
            Direction::In => format!(
                "OPTIONAL MATCH ({})<-[:{}{}]-({}:{})",
                source_var, path.relationship_type, hop_spec, var_name, path.target_label
            ),
            Direction::Both => format!(
                "OPTIONAL MATCH ({})-[:{}{}]-({}:{})",
                source_var, path.relationship_type, hop_spec, var_name, path.target_label
            ),
            Direction::Out => format!(
                "OPTIONAL MATCH ({})-[:{}{}]->({}:{})",
                source_var, path.relationship_type, hop_spec, var_name, path.target_label
            ),
        };

        self.clauses.push(clause);
        var_name
    }

    /// Appends a custom OPTIONAL MATCH pattern verbatim.
    pub fn add_custom_match(&mut self, pattern: &str) {
        self.clauses.push(format!("OPTIONAL MATCH {}", pattern));
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    /// All clauses joined by newlines; empty when no clauses were added.
    pub fn build(&self) -> String {
        self.clauses.join("\n")
    }
}

fn render_hop_spec(min_hops: u32, max_hops: u32) -> String {
    if min_hops == 0 && max_hops == 0 {
        return String::new();
    }
    if min_hops == max_hops && min_hops > 0 {
        return format!("*{}", min_hops);
    }
    if max_hops > 0 {
        if min_hops > 0 {
            format!("*{}..{}", min_hops, max_hops)
        } else {
            format!("*..{}", max_hops)
        }
    } else {
        format!("*{}..", min_hops)
    }
}

/// Builds map expressions for use inside collect(...) aggregations.
#[derive(Default)]
pub struct CollectionBuilder {
    items: Vec<String>,
}

impl CollectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `add_property("email", "e", "address")` generates `email: e.address`.
    pub fn add_property(&mut self, key: &str, source_var: &str, source_prop: &str) {
        self.items
            .push(format!("{}: {}.{}", key, source_var, source_prop));
    }

    /// `add_all_properties("email", "e")` generates `email: properties(e)`.
    pub fn add_all_properties(&mut self, key: &str, source_var: &str) {
        self.items
            .push(format!("{}: properties({})", key, source_var));
    }

    /// `add_custom_expression("fullName", "c.firstName + ' ' + c.lastName")`
    /// generates the pair verbatim.
    pub fn add_custom_expression(&mut self, key: &str, expression: &str) {
        self.items.push(format!("{}: {}", key, expression));
    }

    /// The map expression, e.g. `{email: e.address, verified: e.verified}`.
    pub fn build(&self) -> String {
        if self.items.is_empty() {
            return "{}".to_string();
        }
        format!("{{{}}}", self.items.join(", "))
    }

    pub fn build_distinct_collection(&self) -> String {
        format!("collect(DISTINCT {})", self.build())
    }

    pub fn build_collection(&self) -> String {
        format!("collect({})", self.build())
    }
}

/// Constructs a map projection expression for a single attribute mapping.
///
/// Map projection syntax (`var{.prop}`) is required here: Neo4j rejects
/// mixing plain node-property access with collect(...) in the same RETURN as
/// an implicit grouping error, while a map projection keeps the source
/// variable as a single grouping key.
///
/// With include properties: `email0{.address, .verified, .createdAt}`.
/// Without: `email0{.address, .*}`, or `email0{.*}` when there is no
/// identifier property.
pub fn build_property_map(var_name: &str, mapping: &AttributeMapping) -> String {
    if !mapping.include_properties.is_empty() {
        let mut projections = Vec::new();
        if !mapping.identifier_property.is_empty() {
            projections.push(format!(".{}", mapping.identifier_property));
        }
        for prop in &mapping.include_properties {
            projections.push(format!(".{}", prop));
        }
        return format!("{}{{{}}}", var_name, projections.join(", "));
    }

    if !mapping.identifier_property.is_empty() {
        format!("{}{{.{}, .*}}", var_name, mapping.identifier_property)
    } else {
        format!("{}{{.*}}", var_name)
    }
}

/// Groups attribute mappings by category, preserving first-seen category
/// order and the caller's mapping order within each category. An empty
/// category maps to `other_attributes`.
pub fn group_mappings_by_category(
    mappings: &[AttributeMapping],
) -> Vec<(String, Vec<&AttributeMapping>)> {
    let mut categorized: Vec<(String, Vec<&AttributeMapping>)> = Vec::new();

    for mapping in mappings {
        let category = if mapping.attribute_category.is_empty() {
            "other_attributes"
        } else {
            mapping.attribute_category.as_str()
        };

        match categorized.iter_mut().find(|(name, _)| name == category) {
            Some((_, group)) => group.push(mapping),
            None => categorized.push((category.to_string(), vec![mapping])),
        }
    }

    categorized
}

/// Reduces a string to a valid Cypher identifier: strips non-alphanumeric
/// characters, prefixes a leading digit with `v`, and substitutes `var` for
/// an empty result.
pub fn sanitize_identifier(s: &str) -> String {
    let mut sanitized: String = s.chars().filter(char::is_ascii_alphanumeric).collect();

    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, 'v');
    }

    if sanitized.is_empty() {
        sanitized.push_str("var");
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn mapping(rel: &str, label: &str, id: &str, category: &str, props: &[&str]) -> AttributeMapping {
        AttributeMapping {
            relationship_type: rel.to_string(),
            target_label: label.to_string(),
            identifier_property: id.to_string(),
            attribute_category: category.to_string(),
            include_properties: props.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn attribute_match_generates_numbered_variables() {
        let mut builder = OptionalMatchBuilder::new();

        let v0 = builder.add_attribute_match("c", &mapping("HAS_EMAIL", "Email", "", "", &[]));
        let v1 = builder.add_attribute_match("c", &mapping("HAS_PHONE", "Phone", "", "", &[]));
        let v2 = builder.add_attribute_match("c", &mapping("HAS_SSN", "SSN", "", "", &[]));

        assert_eq!(v0, "attr0");
        assert_eq!(v1, "attr1");
        assert_eq!(v2, "attr2");
        assert_eq!(builder.clause_count(), 3);
        assert_eq!(
            builder.build(),
            "OPTIONAL MATCH (c)-[:HAS_EMAIL]->(attr0:Email)\n\
             OPTIONAL MATCH (c)-[:HAS_PHONE]->(attr1:Phone)\n\
             OPTIONAL MATCH (c)-[:HAS_SSN]->(attr2:SSN)"
        );
    }

    #[test]
    fn empty_builder_builds_empty_string() {
        let builder = OptionalMatchBuilder::new();
        assert_eq!(builder.build(), "");
        assert_eq!(builder.clause_count(), 0);
    }

    #[rstest]
    #[case(2, 2, "*2")]
    #[case(1, 3, "*1..3")]
    #[case(0, 3, "*..3")]
    #[case(2, 0, "*2..")]
    #[case(0, 0, "")]
    fn hop_ranges_render_per_contract(#[case] min: u32, #[case] max: u32, #[case] expected: &str) {
        assert_eq!(render_hop_spec(min, max), expected);
    }

    #[test]
    fn path_match_renders_direction() {
        let mut builder = OptionalMatchBuilder::new();
        let spec = PathSpecification {
            relationship_type: "KNOWS".to_string(),
            direction: Direction::In,
            target_label: "Person".to_string(),
            min_hops: 1,
            max_hops: 3,
        };
        let var = builder.add_path_match("c", &spec);

        assert_eq!(var, "path0");
        assert_eq!(
            builder.build(),
            "OPTIONAL MATCH (c)<-[:KNOWS*1..3]-(path0:Person)"
        );
    }

    #[test]
    fn path_match_both_directions_omits_arrow() {
        let mut builder = OptionalMatchBuilder::new();
        let spec = PathSpecification {
            relationship_type: "TRANSACTION".to_string(),
            direction: Direction::Both,
            target_label: "Account".to_string(),
            min_hops: 0,
            max_hops: 0,
        };
        builder.add_path_match("a", &spec);

        assert_eq!(
            builder.build(),
            "OPTIONAL MATCH (a)-[:TRANSACTION]-(path0:Account)"
        );
    }

    #[test]
    fn custom_match_appends_verbatim() {
        let mut builder = OptionalMatchBuilder::new();
        builder.add_custom_match("(c)-[:OWNS]->(a:Account)-[:TRANSACTION]->(t)");
        assert_eq!(
            builder.build(),
            "OPTIONAL MATCH (c)-[:OWNS]->(a:Account)-[:TRANSACTION]->(t)"
        );
    }

    #[test]
    fn collection_builder_composes_map_expressions() {
        let mut builder = CollectionBuilder::new();
        builder.add_property("email", "e", "address");
        builder.add_all_properties("details", "e");
        builder.add_custom_expression("fullName", "c.firstName + ' ' + c.lastName");

        assert_eq!(
            builder.build(),
            "{email: e.address, details: properties(e), fullName: c.firstName + ' ' + c.lastName}"
        );
        assert_eq!(
            builder.build_distinct_collection(),
            "collect(DISTINCT {email: e.address, details: properties(e), fullName: c.firstName + ' ' + c.lastName})"
        );
    }

    #[test]
    fn empty_collection_builds_empty_map() {
        let builder = CollectionBuilder::new();
        assert_eq!(builder.build(), "{}");
        assert_eq!(builder.build_collection(), "collect({})");
    }

    #[test]
    fn property_map_with_include_properties_uses_projection_syntax() {
        let m = mapping("HAS_EMAIL", "Email", "address", "", &["verified", "createdAt"]);
        assert_eq!(
            build_property_map("email0", &m),
            "email0{.address, .verified, .createdAt}"
        );
    }

    #[test]
    fn property_map_without_includes_projects_all() {
        let with_id = mapping("HAS_EMAIL", "Email", "address", "", &[]);
        assert_eq!(build_property_map("email0", &with_id), "email0{.address, .*}");

        let without_id = mapping("HAS_ADDRESS", "Address", "", "", &[]);
        assert_eq!(build_property_map("addr0", &without_id), "addr0{.*}");
    }

    #[test]
    fn grouping_defaults_empty_category_and_preserves_order() {
        let mappings = vec![
            mapping("HAS_EMAIL", "Email", "address", "contact_information", &[]),
            mapping("HAS_SSN", "SSN", "number", "identity_documents", &[]),
            mapping("HAS_PHONE", "Phone", "number", "contact_information", &[]),
            mapping("KNOWS", "Person", "", "", &[]),
        ];

        let grouped = group_mappings_by_category(&mappings);

        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[0].0, "contact_information");
        assert_eq!(grouped[0].1.len(), 2);
        assert_eq!(grouped[0].1[0].relationship_type, "HAS_EMAIL");
        assert_eq!(grouped[0].1[1].relationship_type, "HAS_PHONE");
        assert_eq!(grouped[1].0, "identity_documents");
        assert_eq!(grouped[2].0, "other_attributes");
    }

    #[rstest]
    #[case("contact_information", "contactinformation")]
    #[case("has-email!", "hasemail")]
    #[case("123abc", "v123abc")]
    #[case("!!!", "var")]
    #[case("", "var")]
    fn sanitize_identifier_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_identifier(input), expected);
    }
}
