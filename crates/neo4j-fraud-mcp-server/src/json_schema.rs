/// Derives a tool's input schema from its input struct.
///
/// Schemas are pinned to JSON Schema draft-07: tool inputs here lean on
/// plain objects, arrays, and defaults, all stable since that draft, and
/// newer drafts are not uniformly understood across MCP clients.
#[macro_export]
macro_rules! schema_from_type {
    ($type:ty) => {{
        let generator = schemars::generate::SchemaSettings::draft07().into_generator();
        let schema = generator.into_root_schema_for::<$type>();
        match serde_json::to_value(schema) {
            Ok(serde_json::Value::Object(schema)) => schema,
            _ => panic!("Failed to generate schema for {}", stringify!($type)),
        }
    }};
}
