//! Schema Refiner: enriches a requested schema's properties with UI hints
//! while preserving validation semantics. Pure and idempotent after the
//! first application.

use regex::Regex;
use sa_domain::schema::{Preset, Property, RequestedSchema};
use sa_domain::trace::TraceEvent;

/// Constructed once at startup with an explicit, already-loaded preset
/// list — never a process-wide static (per the design note on global
/// preset registries).
pub struct Refiner {
    presets: Vec<Preset>,
    date_pattern: Regex,
}

impl Refiner {
    pub fn new(presets: Vec<Preset>) -> Self {
        Self {
            presets,
            date_pattern: Regex::new(r"(?i)yyyy-mm-dd([ t]hh:mm(:ss)?)?").unwrap(),
        }
    }

    pub fn with_no_presets() -> Self {
        Self::new(Vec::new())
    }

    /// Mutates `schema` in place. Never panics, never returns an error —
    /// a malformed preset set is treated as zero matches.
    pub fn refine(&self, schema: &mut RequestedSchema) {
        let field_set: std::collections::BTreeSet<&str> =
            schema.properties.keys().map(|s| s.as_str()).collect();

        let matching_preset = self.find_matching_preset(&field_set);
        let preset_matched = matching_preset.map(|p| p.name.clone());
        if let Some(preset) = matching_preset {
            for field in &preset.fields {
                if let Some(prop) = schema.properties.get_mut(&field.name) {
                    if field.title.is_some() {
                        prop.title = field.title.clone();
                    }
                    if field.description.is_some() {
                        prop.description = field.description.clone();
                    }
                    if field.format.is_some() {
                        prop.format = field.format.clone();
                    }
                    if field.x_ui_widget.is_some() {
                        prop.x_ui_widget = field.x_ui_widget.clone();
                    }
                    if field.x_ui_order.is_some() {
                        prop.x_ui_order = field.x_ui_order;
                    }
                }
            }
        }

        for prop in schema.properties.values_mut() {
            if prop.kind.is_none() {
                prop.kind = Some("string".into());
            }
            if prop.kind.as_deref() == Some("array") {
                if prop.default.is_none() {
                    prop.default = Some(serde_json::Value::Array(Vec::new()));
                }
                let is_string_items = prop
                    .items
                    .as_ref()
                    .and_then(|i| i.kind.as_deref())
                    .map(|k| k == "string")
                    .unwrap_or(false);
                if is_string_items {
                    prop.x_ui_widget = Some("tags".into());
                }
            }
            if prop.format.is_none() {
                if let Some(hint) = prop.title.as_deref().or(prop.description.as_deref()) {
                    if self.date_pattern.is_match(hint) {
                        let has_time = hint.to_ascii_lowercase().contains("hh:mm");
                        prop.format = Some(if has_time { "date-time".into() } else { "date".into() });
                    }
                }
            }
        }

        if !schema.properties.values().any(|p| p.x_ui_order.is_some()) {
            self.assign_heuristic_order(schema);
        }

        TraceEvent::SchemaRefined {
            schema_kind: schema.kind.clone(),
            fields_annotated: schema.properties.len(),
            preset_matched,
        }
        .emit();
    }

    fn find_matching_preset(&self, field_set: &std::collections::BTreeSet<&str>) -> Option<&Preset> {
        let mut matches = self.presets.iter().filter(|p| {
            let preset_fields: std::collections::BTreeSet<&str> =
                p.match_fields.iter().map(|s| s.as_str()).collect();
            preset_fields == *field_set
        });
        let first = matches.next();
        if matches.next().is_some() {
            tracing::warn!("more than one preset matches the requested schema's field set; keeping the first");
        }
        first
    }

    fn assign_heuristic_order(&self, schema: &mut RequestedSchema) {
        let mut order_names: Vec<String> = Vec::new();

        let mut names: Vec<&String> = schema.properties.keys().collect();
        names.sort();

        let name_fields: Vec<String> = names
            .iter()
            .filter(|n| n.to_ascii_lowercase().starts_with("name"))
            .map(|n| n.to_string())
            .collect();
        order_names.extend(name_fields.iter().cloned());

        for req in &schema.required {
            if !order_names.contains(req) {
                order_names.push(req.clone());
            }
        }

        let mut remaining: Vec<String> = names
            .iter()
            .filter(|n| !order_names.contains(&n.to_string()))
            .map(|n| n.to_string())
            .collect();

        let mut start_end_pairs: Vec<(String, String)> = Vec::new();
        let mut consumed = std::collections::HashSet::new();
        for name in &remaining {
            if consumed.contains(name) {
                continue;
            }
            if let Some(stem) = name.strip_prefix("start") {
                let end_name = format!("end{stem}");
                if remaining.contains(&end_name) {
                    start_end_pairs.push((name.clone(), end_name.clone()));
                    consumed.insert(name.clone());
                    consumed.insert(end_name);
                }
            }
        }
        remaining.retain(|n| !consumed.contains(n));
        remaining.sort();

        for (start, end) in start_end_pairs {
            order_names.push(start);
            order_names.push(end);
        }
        order_names.extend(remaining);

        for (i, name) in order_names.iter().enumerate() {
            if let Some(prop) = schema.properties.get_mut(name) {
                prop.x_ui_order = Some((i as u32 + 1) * 10);
            }
        }
    }
}
