//! PostgREST query descriptions
//!
//! A [`Query`] is a plain description of one filtered/ordered read (or the
//! row filter of an update): table name, column selection, filters, ordering
//! and limit. It renders into query-string pairs for the REST surface; the
//! client never concatenates URLs by hand.

const DEFAULT_SELECT: &str = "*";

#[derive(Debug, Clone)]
pub struct Query {
    table: String,
    select: String,
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<usize>,
}

impl Query {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: name.into(),
            select: DEFAULT_SELECT.to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Column selection, including embedded resources
    /// (e.g. `*,patients(*)` or `doctors:user_profiles(*)`)
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = columns.into();
        self
    }

    pub fn eq(mut self, column: &str, value: impl std::fmt::Display) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value)));
        self
    }

    pub fn gte(mut self, column: &str, value: impl std::fmt::Display) -> Self {
        self.filters
            .push((column.to_string(), format!("gte.{}", value)));
        self
    }

    pub fn lte(mut self, column: &str, value: impl std::fmt::Display) -> Self {
        self.filters
            .push((column.to_string(), format!("lte.{}", value)));
        self
    }

    /// Case-insensitive substring match across several columns.
    ///
    /// The term is double-quoted before being interpolated into the
    /// `or=(...)` filter expression, so PostgREST grammar characters in
    /// caller input (commas, parentheses, dots) stay literal instead of
    /// reshaping the filter.
    pub fn or_ilike(mut self, columns: &[&str], term: &str) -> Self {
        let pattern = quote_pattern(term);
        let parts: Vec<String> = columns
            .iter()
            .map(|column| format!("{}.ilike.{}", column, pattern))
            .collect();
        self.filters
            .push(("or".to_string(), format!("({})", parts.join(","))));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order = Some(format!("{}.{}", column, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Render into query-string pairs
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select.clone())];
        params.extend(self.filters.iter().cloned());
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

/// Render a caller-supplied search term as a double-quoted `ilike`
/// pattern. Inside PostgREST double quotes only `"` and `\` need
/// backslash escapes; everything else is literal, so names like
/// "O'Brien" keep their punctuation. Wildcards are stripped because the
/// match is always surround-with-`*` substring.
fn quote_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 4);
    pattern.push_str("\"*");
    for c in term.trim().chars() {
        match c {
            '*' | '%' => {}
            '"' | '\\' => {
                pattern.push('\\');
                pattern.push(c);
            }
            _ => pattern.push(c),
        }
    }
    pattern.push_str("*\"");
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_rendering() {
        let query = Query::table("patients")
            .eq("status", "waiting")
            .order("created_at", false)
            .limit(20);
        assert_eq!(query.table_name(), "patients");
        assert_eq!(
            query.to_params(),
            vec![
                ("select".to_string(), "*".to_string()),
                ("status".to_string(), "eq.waiting".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "20".to_string()),
            ]
        );
    }

    #[test]
    fn test_embedded_select_and_range() {
        let query = Query::table("patient_queue")
            .select("*,patients(*)")
            .gte("date", "2024-01-01")
            .lte("date", "2024-01-31");
        let params = query.to_params();
        assert_eq!(params[0], ("select".to_string(), "*,patients(*)".to_string()));
        assert_eq!(params[1], ("date".to_string(), "gte.2024-01-01".to_string()));
        assert_eq!(params[2], ("date".to_string(), "lte.2024-01-31".to_string()));
    }

    #[test]
    fn test_or_ilike_renders_all_columns() {
        let query = Query::table("patients").or_ilike(&["name", "id_number", "id"], "smith");
        let params = query.to_params();
        assert_eq!(
            params[1],
            (
                "or".to_string(),
                "(name.ilike.\"*smith*\",id_number.ilike.\"*smith*\",id.ilike.\"*smith*\")"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_or_ilike_keeps_grammar_characters_literal() {
        // Quotes and backslashes are escaped, wildcards dropped; list
        // separators and parentheses stay inside the quoted pattern
        let query = Query::table("patients").or_ilike(&["name"], "smi,th)(\"*%");
        let params = query.to_params();
        assert_eq!(
            params[1],
            ("or".to_string(), "(name.ilike.\"*smi,th)(\\\"*\")".to_string())
        );
    }

    #[test]
    fn test_or_ilike_preserves_name_punctuation() {
        let query = Query::table("patients").or_ilike(&["name"], "O'Brien Jr.");
        let params = query.to_params();
        assert_eq!(
            params[1],
            ("or".to_string(), "(name.ilike.\"*O'Brien Jr.*\")".to_string())
        );
    }
}
