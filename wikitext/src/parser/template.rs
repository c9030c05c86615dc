use crate::node::{ParamValue, Params, TemplateInvocation};
use crate::parser::MAX_NESTING_DEPTH;
use crate::parser::error::ParseError;
use crate::parser::markup::{self, Fragment, RawParam, RawTemplate};
use crate::parser::sequence::Sequencer;

// ---------------------------------------------------------------------------
// Template resolution
// ---------------------------------------------------------------------------

impl Sequencer {
    /// Resolve one invocation into a record.
    ///
    /// Always produces a record: if the invocation cannot be resolved at all
    /// the warning is recorded and the `parse_error` sentinel takes its place.
    pub(crate) fn resolve_template(&mut self, raw: &RawTemplate<'_>, depth: usize) -> TemplateInvocation {
        match self.try_resolve(raw, depth) {
            Ok(invocation) => invocation,
            Err(error) => {
                self.report(error);
                TemplateInvocation::resolution_failed(raw.span.clone())
            }
        }
    }

    fn try_resolve(&mut self, raw: &RawTemplate<'_>, depth: usize) -> Result<TemplateInvocation, ParseError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ParseError::warning(
                format!("templates nested deeper than {} levels", MAX_NESTING_DEPTH),
                raw.span.clone(),
                self.file_id,
            ));
        }

        let name = validate_name(raw.name).map_err(|reason| {
            ParseError::warning(
                format!("invalid template name: {}", reason),
                raw.span.clone(),
                self.file_id,
            )
            .with_note(format!("in `{}`", abbreviate(raw.raw)))
        })?;

        let mut params = Params::new();
        let mut position = 0usize;
        for param in &raw.params {
            let key = match param.key {
                Some(key) => key.trim().to_string(),
                None => {
                    position += 1;
                    position.to_string()
                }
            };
            // Resolved once per occurrence; a repeated key overwrites the earlier value
            let value = self.resolve_value(param, depth);
            params.insert(key, value);
        }

        Ok(TemplateInvocation::new(name, params, raw.span.clone()))
    }

    /// Plain text unless the value looks like it holds markup, in which case
    /// it is re-parsed: a lone invocation collapses into a nested record,
    /// anything mixed becomes a node list.
    fn resolve_value(&mut self, param: &RawParam<'_>, depth: usize) -> ParamValue {
        let value = param.value.trim();
        if !value.contains("{{") && !value.starts_with('=') {
            return ParamValue::Text(value.to_string());
        }

        let offset = param.value_start + (param.value.len() - param.value.trim_start().len());
        let span = offset..offset + value.len();

        if depth >= MAX_NESTING_DEPTH {
            self.report(
                ParseError::warning(
                    format!("templates nested deeper than {} levels", MAX_NESTING_DEPTH),
                    span,
                    self.file_id,
                )
                .with_note("parameter kept as plain text"),
            );
            return ParamValue::Text(value.to_string());
        }

        let fragments = markup::scan(value, offset);
        let mut templates = fragments.iter().filter_map(|f| match f {
            Fragment::Template(t) => Some(t),
            _ => None,
        });

        match (templates.next(), templates.next()) {
            (None, _) => ParamValue::Text(value.to_string()),
            (Some(only), None) if markup::residue(&fragments).is_empty() => {
                match self.try_resolve(only, depth + 1) {
                    Ok(nested) => ParamValue::Template(nested),
                    Err(error) => {
                        self.report(error.with_note("parameter kept as plain text"));
                        ParamValue::Text(value.to_string())
                    }
                }
            }
            _ => ParamValue::Nodes(self.sequence_fragments(&fragments, depth + 1)),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_name(name: &str) -> Result<String, &'static str> {
    let name = markup::strip_comments(name);
    let name = name.trim();
    if name.is_empty() {
        return Err("name is empty");
    }
    if name.contains('\n') {
        return Err("name spans several lines");
    }
    if name.contains(['[', ']', '<', '>']) {
        return Err("name contains link or tag markup");
    }
    Ok(name.to_string())
}

fn abbreviate(raw: &str) -> String {
    const LIMIT: usize = 40;
    match raw.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw.to_string(),
    }
}
