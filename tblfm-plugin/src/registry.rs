//! Plugin Registry

use crate::{EvalContext, FunctionMeta, FunctionPlugin};
use serde_json::{json, Value as JsonValue};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tblfm_core::{FormulaError, Value};

/// Central plugin registry
pub struct PluginRegistry {
    functions: HashMap<String, Arc<dyn FunctionPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    pub fn with_function<F: FunctionPlugin + 'static>(mut self, f: F) -> Self {
        let name = f.meta().name.to_lowercase();
        self.functions.insert(name, Arc::new(f));
        self
    }

    pub fn get_function(&self, name: &str) -> Option<&dyn FunctionPlugin> {
        self.functions.get(&name.to_lowercase()).map(|f| f.as_ref())
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_lowercase())
    }

    pub fn call_function(&self, name: &str, input: &Value, ctx: &EvalContext) -> Result<Value, FormulaError> {
        match self.get_function(name) {
            Some(f) => f.call(input, ctx),
            None => Err(FormulaError::UnknownFunction {
                name: name.to_string(),
                directive: String::new(),
                similar: self.find_similar_functions(name),
            }),
        }
    }

    /// Function names similar to `name`, best match first
    pub fn find_similar_functions(&self, name: &str) -> Vec<String> {
        let name_lower = name.to_lowercase();
        let mut matches: Vec<(String, usize)> = self
            .functions
            .keys()
            .filter_map(|func_name| {
                let score = Self::similarity_score(&name_lower, func_name);
                (score > 0).then(|| (func_name.clone(), score))
            })
            .collect();

        matches.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        matches.into_iter().map(|(name, _)| name).collect()
    }

    fn similarity_score(query: &str, candidate: &str) -> usize {
        let mut score = 0;

        if candidate.starts_with(query) {
            score += 100;
        } else if candidate.contains(query) {
            score += 50;
        } else if query.contains(candidate) {
            score += 30;
        }

        let query_chars: HashSet<char> = query.chars().collect();
        let candidate_chars: HashSet<char> = candidate.chars().collect();
        let common = query_chars.intersection(&candidate_chars).count();
        score += common * 2;

        let len_diff = query.len().abs_diff(candidate.len());
        if len_diff < 5 && score > 0 {
            score += 5 - len_diff;
        }

        score
    }

    pub fn help(&self, name: Option<&str>) -> JsonValue {
        match name {
            Some(n) => self.help_for(n),
            None => self.general_help(),
        }
    }

    fn help_for(&self, name: &str) -> JsonValue {
        match self.get_function(name) {
            Some(f) => Self::function_to_help(f.meta()),
            None => {
                let similar: Vec<String> = self.find_similar_functions(name).into_iter().take(5).collect();
                json!({
                    "error": format!("No function named '{}'", name),
                    "similar": similar,
                })
            }
        }
    }

    fn general_help(&self) -> JsonValue {
        let mut funcs_by_cat: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, f) in &self.functions {
            funcs_by_cat.entry(f.meta().category.to_string()).or_default().push(name.clone());
        }
        for names in funcs_by_cat.values_mut() {
            names.sort();
        }

        json!({
            "functions": funcs_by_cat,
            "usage": "Call help('function_name') for detailed help.",
        })
    }

    fn function_to_help(meta: FunctionMeta) -> JsonValue {
        json!({
            "name": meta.name,
            "type": "function",
            "description": meta.description,
            "usage": meta.usage,
            "returns": meta.returns,
            "category": meta.category,
            "args": meta.args,
            "examples": meta.examples,
            "related": meta.related,
        })
    }

    pub fn list_functions(&self, category: Option<&str>) -> JsonValue {
        let mut metas: Vec<FunctionMeta> = self
            .functions
            .values()
            .map(|f| f.meta())
            .filter(|meta| category.map_or(true, |c| meta.category == c))
            .collect();
        metas.sort_by_key(|meta| meta.name);

        JsonValue::Array(
            metas
                .into_iter()
                .map(|meta| {
                    json!({
                        "name": meta.name,
                        "description": meta.description,
                        "usage": meta.usage,
                        "category": meta.category,
                    })
                })
                .collect(),
        )
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArgMeta;

    struct Count;

    static COUNT_ARGS: [ArgMeta; 1] = [ArgMeta::required("range", "Range", "Cells to count")];

    impl FunctionPlugin for Count {
        fn meta(&self) -> FunctionMeta {
            FunctionMeta {
                name: "count",
                description: "Number of cells",
                usage: "count(range)",
                args: &COUNT_ARGS,
                returns: "Number",
                examples: &[],
                category: "aggregate",
                related: &[],
            }
        }

        fn call(&self, input: &Value, _ctx: &EvalContext) -> Result<Value, FormulaError> {
            Ok(Value::cell(input.iter().count().to_string()))
        }
    }

    fn registry() -> PluginRegistry {
        PluginRegistry::new().with_function(Count)
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let reg = registry();
        assert!(reg.has_function("count"));
        assert!(reg.has_function("COUNT"));
        assert!(!reg.has_function("sum"));
    }

    #[test]
    fn test_call_function() {
        let reg = Arc::new(registry());
        let ctx = EvalContext::new(reg.clone());
        let input = Value::from_rows(vec![vec!["1".into(), "2".into()]]);
        assert_eq!(reg.call_function("count", &input, &ctx).unwrap(), Value::cell("2"));
        assert!(matches!(
            reg.call_function("nope", &input, &ctx),
            Err(FormulaError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_similar_names() {
        let reg = registry();
        assert_eq!(reg.find_similar_functions("cnt").first().map(String::as_str), Some("count"));
    }

    #[test]
    fn test_help_and_list() {
        let reg = registry();
        assert_eq!(reg.help(Some("count"))["usage"], "count(range)");
        assert!(reg.help(Some("cout"))["error"].is_string());
        assert_eq!(reg.help(None)["functions"]["aggregate"][0], "count");
        assert_eq!(reg.list_functions(Some("aggregate"))[0]["name"], "count");
        assert_eq!(reg.list_functions(Some("text")).as_array().map(Vec::len), Some(0));
    }
}
