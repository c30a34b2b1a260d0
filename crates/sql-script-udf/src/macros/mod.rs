mod params;

pub(crate) use params::flatten_identifier;

use std::sync::Arc;

use crate::errors::ScriptSqlError;
use crate::script::ScriptDialect;
use crate::udf::{AggregatorKind, UdfDescriptor, UdfType};

/// The two inputs a [`MacroParser`] needs, grouped the way the teacher groups
/// its own linter configuration into one config struct rather than passing
/// loose primitives: `func_num_start` and `dialect` always travel together,
/// so `squery`/`parse_macros` take one `MacroParserConfig` instead of two
/// bare positional parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroParserConfig {
    /// Offsets the generated function-name counter so repeated calls
    /// against the same catalog (e.g. one per statement in a
    /// multi-statement script) never collide.
    pub func_num_start: u32,
    /// The script dialect every macro in this call is assumed to be written
    /// in.
    pub dialect: ScriptDialect,
}

impl MacroParserConfig {
    pub fn new(func_num_start: u32, dialect: ScriptDialect) -> Self {
        MacroParserConfig { func_num_start, dialect }
    }
}

/// Rewrites inline `<? ... ?>` script macros out of a SQL string into
/// synthesized UDF calls, collecting one [`UdfDescriptor`] per macro found.
///
/// A single parser instance owns the call-site counter used to name
/// generated functions, so macros across one `SQuery` call get distinct,
/// stable names in textual order.
pub(crate) struct MacroParser {
    dialect: ScriptDialect,
    next_id: u32,
}

impl MacroParser {
    pub(crate) fn new(config: MacroParserConfig) -> Self {
        MacroParser { dialect: config.dialect, next_id: config.func_num_start + 1 }
    }

    pub(crate) fn rewrite(&mut self, sql: &str) -> Result<(String, Vec<Arc<UdfDescriptor>>), ScriptSqlError> {
        let mut out = String::with_capacity(sql.len());
        let mut descriptors = Vec::new();
        let mut cursor = 0;

        while let Some(open_rel) = sql[cursor..].find("<?") {
            let open = cursor + open_rel;
            let search_from = open + 2;
            let close_rel = sql[search_from..]
                .find("?>")
                .ok_or_else(|| ScriptSqlError::macro_syntax("unterminated <? ... ?> macro"))?;
            let close = search_from + close_rel;
            let inner = &sql[search_from..close];

            out.push_str(&sql[cursor..open]);

            let (descriptor, params) = self.classify_and_build(inner)?;
            out.push_str(&descriptor.id);
            out.push('(');
            out.push_str(&params.join(", "));
            out.push(')');
            descriptors.push(Arc::new(descriptor));

            cursor = close + 2;
        }
        out.push_str(&sql[cursor..]);

        Ok((out, descriptors))
    }

    /// Classifies one macro's inner text by its opening tag, strips the
    /// class prefix (and, for Generic aggregators, the seed region), hands
    /// the remaining body to the parameter extractor, and builds the
    /// resulting descriptor and its ordered positional parameter list.
    fn classify_and_build(&mut self, inner: &str) -> Result<(UdfDescriptor, Vec<String>), ScriptSqlError> {
        let tag = inner.get(0..4);

        let (kind, flatten, transpose, body_after_tag, seed) = match tag {
            Some("L__@") => (AggregatorKind::List, false, false, &inner[4..], None),
            Some("L_T@") => (AggregatorKind::List, false, true, &inner[4..], None),
            Some("LFT@") => (AggregatorKind::List, true, true, &inner[4..], None),
            Some("S__@") => (AggregatorKind::Set, false, false, &inner[4..], None),
            Some("S_T@") => (AggregatorKind::Set, false, true, &inner[4..], None),
            Some("SFT@") => (AggregatorKind::Set, true, true, &inner[4..], None),
            Some("AGG@") => {
                let (seed, rest) = split_generic_seed(inner)?;
                (AggregatorKind::Generic, false, false, rest, Some(seed))
            }
            Some("AGT@") => {
                let (seed, rest) = split_generic_seed(inner)?;
                (AggregatorKind::Generic, false, true, rest, Some(seed))
            }
            // Every valid generic-aggregator tag starts "AG" (`AGG@`/`AGT@`);
            // a Generic aggregator carries no Flatten modifier (the author
            // controls folding), so any other "AG"-prefixed 4-byte tag is a
            // malformed attempt at one — reject it here rather than letting
            // it fall through and silently reclassify as Scalar.
            Some(t) if t.len() == 4 && t.starts_with("AG") => {
                return Err(ScriptSqlError::macro_syntax(format!(
                    "`{t}` is not a valid generic-aggregator tag (use `AGG@` or `AGT@`; \
                     Generic aggregators do not support Flatten)"
                )));
            }
            _ => (AggregatorKind::None, false, false, inner, None),
        };

        let id = self.next_name(kind);
        self.next_id += 1;

        let (body, params) = params::extract_params(body_after_tag)?;
        let udf_type = UdfType { aggregator_kind: kind, flatten, transpose };
        let mut descriptor = UdfDescriptor::new(id, self.dialect, body, udf_type);
        if let Some(seed) = seed {
            descriptor = descriptor.with_generic_seed(seed);
        }

        Ok((descriptor, params))
    }

    fn next_name(&self, kind: AggregatorKind) -> String {
        match kind {
            AggregatorKind::None => format!("_auto_{}_udf_", self.next_id),
            _ => format!("fold_auto_{}_udf_", self.next_id),
        }
    }
}

/// Strips a Generic aggregator's 4-character class tag (`AGG@`/`AGT@`) and
/// returns the seed source — still wrapped in its leading `@` and trailing
/// `#` — alongside whatever body text follows the seed region.
fn split_generic_seed(inner: &str) -> Result<(String, &str), ScriptSqlError> {
    let after_tag = &inner[4..];
    let hash_pos = after_tag
        .find('#')
        .ok_or_else(|| ScriptSqlError::macro_syntax("generic aggregator macro missing closing # after seed"))?;
    let seed_region = &after_tag[..=hash_pos];
    let rest = &after_tag[hash_pos + 1..];
    Ok((format!("@{seed_region}"), rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_macro_rewrites_to_auto_udf_call() {
        let mut parser = MacroParser::new(MacroParserConfig::new(0, ScriptDialect::Js));
        let (sql, descriptors) = parser.rewrite("SELECT <? @{mytable.name} + '!' ?> FROM mytable").unwrap();
        assert_eq!(sql, "SELECT _auto_1_udf_(mytable.name) FROM mytable");
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].id, "_auto_1_udf_");
        assert!(!descriptors[0].udf_type.is_aggregator());
    }

    #[test]
    fn list_aggregator_macro_is_classified_and_stripped() {
        let mut parser = MacroParser::new(MacroParserConfig::new(0, ScriptDialect::Js));
        let (sql, descriptors) =
            parser.rewrite("SELECT <?L__@ $_.concat([@{mytable.phone_numbers}]) ?> FROM mytable").unwrap();
        assert_eq!(sql, "SELECT fold_auto_1_udf_(mytable.phone_numbers) FROM mytable");
        assert_eq!(descriptors[0].udf_type.aggregator_kind, AggregatorKind::List);
        assert!(!descriptors[0].body.contains("@{"));
    }

    #[test]
    fn generic_aggregator_retains_seed_with_delimiters() {
        let mut parser = MacroParser::new(MacroParserConfig::new(0, ScriptDialect::Js));
        let (sql, descriptors) =
            parser.rewrite("SELECT <?AGG@ [0,1] # $_[0]+=1; $_[1]*=$_[0]; $_ ?> FROM mytable").unwrap();
        assert_eq!(sql, "SELECT fold_auto_1_udf_() FROM mytable");
        assert_eq!(descriptors[0].udf_type.aggregator_kind, AggregatorKind::Generic);
    }

    #[test]
    fn unterminated_macro_is_a_syntax_error() {
        let mut parser = MacroParser::new(MacroParserConfig::new(0, ScriptDialect::Js));
        assert!(parser.rewrite("SELECT <? 1 + 1 FROM mytable").is_err());
    }

    #[test]
    fn counter_starts_after_func_num_start() {
        let mut parser = MacroParser::new(MacroParserConfig::new(5, ScriptDialect::Js));
        let (_, descriptors) = parser.rewrite("SELECT <? 1 ?>, <? 2 ?>").unwrap();
        assert_eq!(descriptors[0].id, "_auto_6_udf_");
        assert_eq!(descriptors[1].id, "_auto_7_udf_");
    }

    #[test]
    fn generic_aggregator_with_flatten_tag_is_rejected_at_parse_time() {
        let mut parser = MacroParser::new(MacroParserConfig::new(0, ScriptDialect::Js));
        let err = parser.rewrite("SELECT <?AGF@ [0] # $_ ?> FROM mytable").unwrap_err();
        assert!(matches!(err, ScriptSqlError::MacroSyntax(_)));
    }
}
