//! Typed FFmpeg Filter Graph
//!
//! A declarative media-transform plan: numbered inputs plus ordered stages that
//! consume and produce named stream labels. Argument values carry their kind
//! (literal, expression, drawtext text) so escaping is decided when the graph is
//! rendered, never by re-parsing strings.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut graph = FilterGraph::new();
//! let img = graph.add_input(MediaKind::Image, "/tmp/a.png", vec![("-loop".into(), "1".into())]);
//! graph.push_stage(Stage::new(
//!     vec![FilterGraph::stream_label(img, 'v')],
//!     vec![Filter::new("scale").lit("w", 1080).lit("h", 1920)],
//!     vec!["v0".into()],
//! ));
//! // "[0:v]scale=w=1080:h=1920[v0]"
//! let fc = graph.to_filter_complex();
//! ```

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{CoreError, CoreResult};

// =============================================================================
// Escaping
// =============================================================================

/// Option-level escaping: `:` separates options, `\` and `'` escape/quote.
fn escape_option_value(raw: &str) -> String {
    escape_chars(raw, &['\\', '\'', ':'])
}

/// Graph-level escaping: `,` `;` `[` `]` delimit filters, chains, and labels.
fn escape_graph_value(raw: &str) -> String {
    escape_chars(raw, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if special.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Escapes a plain value (paths, names, colors) for use inside a filtergraph.
pub fn escape_ffmpeg_filter_value(raw: &str) -> String {
    escape_graph_value(&escape_option_value(raw))
}

/// Escapes user text for drawtext; `%{...}` and `\` are expansion syntax there.
pub fn escape_drawtext_value(raw: &str) -> String {
    let expanded = escape_chars(raw, &['\\', '%']);
    escape_ffmpeg_filter_value(&expanded)
}

/// Formats a number compactly and deterministically (`4`, `0.48`, `1.22`).
pub fn num(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let mut s = format!("{:.6}", value);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

// =============================================================================
// Graph Model
// =============================================================================

/// Kind of a numbered media input
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    Image,
    Audio,
}

/// A numbered `-i` input with its preceding input options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInput {
    pub index: usize,
    pub kind: MediaKind,
    pub path: PathBuf,
    /// Flags placed before `-i`, e.g. `("-loop", "1")`
    pub options: Vec<(String, String)>,
}

/// Typed filter argument value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ArgValue {
    /// Plain value, escaped for option and graph levels
    Literal(String),
    /// Evaluated expression, emitted single-quoted
    Expr(String),
    /// drawtext text, escaped for expansion, option, and graph levels
    Text(String),
}

impl ArgValue {
    fn render(&self) -> String {
        match self {
            ArgValue::Literal(v) => escape_ffmpeg_filter_value(v),
            ArgValue::Expr(v) => format!("'{}'", v),
            ArgValue::Text(v) => escape_drawtext_value(v),
        }
    }
}

/// `key=value` (or positional) filter argument
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterArg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: ArgValue,
}

/// One filter in a chain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub name: String,
    #[serde(default)]
    pub args: Vec<FilterArg>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    fn with_arg(mut self, key: Option<&str>, value: ArgValue) -> Self {
        self.args.push(FilterArg {
            key: key.map(str::to_string),
            value,
        });
        self
    }

    /// Adds a literal `key=value`
    pub fn lit(self, key: &str, value: impl Display) -> Self {
        self.with_arg(Some(key), ArgValue::Literal(value.to_string()))
    }

    /// Adds a numeric `key=value` using [`num`] formatting
    pub fn number(self, key: &str, value: f64) -> Self {
        self.with_arg(Some(key), ArgValue::Literal(num(value)))
    }

    /// Adds a quoted expression `key='expr'`
    pub fn expr(self, key: &str, expr: impl Into<String>) -> Self {
        self.with_arg(Some(key), ArgValue::Expr(expr.into()))
    }

    /// Adds drawtext text `key=escaped`
    pub fn text(self, key: &str, text: impl Into<String>) -> Self {
        self.with_arg(Some(key), ArgValue::Text(text.into()))
    }

    /// Adds a positional literal
    pub fn positional(self, value: impl Display) -> Self {
        self.with_arg(None, ArgValue::Literal(value.to_string()))
    }

    /// Literal value of an argument, if present
    pub fn arg(&self, key: &str) -> Option<&ArgValue> {
        self.args
            .iter()
            .find(|a| a.key.as_deref() == Some(key))
            .map(|a| &a.value)
    }

    fn render(&self) -> String {
        if self.args.is_empty() {
            return self.name.clone();
        }
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| match &a.key {
                Some(k) => format!("{}={}", k, a.value.render()),
                None => a.value.render(),
            })
            .collect();
        format!("{}={}", self.name, args.join(":"))
    }
}

/// A filter chain consuming and producing labeled streams
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    #[serde(default)]
    pub inputs: Vec<String>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<String>,
}

impl Stage {
    pub fn new(inputs: Vec<String>, filters: Vec<Filter>, outputs: Vec<String>) -> Self {
        Self {
            inputs,
            filters,
            outputs,
        }
    }

    fn render(&self) -> String {
        let inputs: String = self.inputs.iter().map(|l| format!("[{}]", l)).collect();
        let chain: Vec<String> = self.filters.iter().map(Filter::render).collect();
        let outputs: String = self.outputs.iter().map(|l| format!("[{}]", l)).collect();
        format!("{}{}{}", inputs, chain.join(","), outputs)
    }
}

/// Complete declarative graph
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGraph {
    pub inputs: Vec<MediaInput>,
    pub stages: Vec<Stage>,
    pub video_out: String,
    pub audio_out: String,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label of stream `kind` (`'v'`/`'a'`) of input `index`
    pub fn stream_label(index: usize, kind: char) -> String {
        format!("{}:{}", index, kind)
    }

    /// Registers an input and returns its index
    pub fn add_input(
        &mut self,
        kind: MediaKind,
        path: impl Into<PathBuf>,
        options: Vec<(String, String)>,
    ) -> usize {
        let index = self.inputs.len();
        self.inputs.push(MediaInput {
            index,
            kind,
            path: path.into(),
            options,
        });
        index
    }

    pub fn push_stage(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    /// Renders the `-filter_complex` string
    pub fn to_filter_complex(&self) -> String {
        self.stages
            .iter()
            .map(Stage::render)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Input arguments (`[options...] -i path` per input, in index order)
    pub fn input_args(&self) -> Vec<OsString> {
        self.input_args_with(|path| path.to_path_buf())
    }

    /// Like [`Self::input_args`], with each input path passed through `resolve`
    pub fn input_args_with(&self, resolve: impl Fn(&Path) -> PathBuf) -> Vec<OsString> {
        let mut args = Vec::new();
        for input in &self.inputs {
            for (flag, value) in &input.options {
                args.push(OsString::from(flag));
                args.push(OsString::from(value));
            }
            args.push(OsString::from("-i"));
            args.push(resolve(&input.path).into_os_string());
        }
        args
    }

    /// `-map` arguments for the final video and audio labels
    pub fn map_args(&self) -> Vec<String> {
        vec![
            "-map".to_string(),
            format!("[{}]", self.video_out),
            "-map".to_string(),
            format!("[{}]", self.audio_out),
        ]
    }

    pub fn to_json_pretty(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Checks label wiring and argument safety.
    ///
    /// - input indices are contiguous
    /// - every consumed label is an input stream or produced by an earlier stage
    /// - produced labels are unique and consumed at most once
    /// - produced labels are either consumed or are the final outputs
    /// - expressions contain no quote characters
    pub fn validate(&self) -> CoreResult<()> {
        for (i, input) in self.inputs.iter().enumerate() {
            if input.index != i {
                return Err(invalid(format!("input {} has index {}", i, input.index)));
            }
        }

        let mut produced: HashSet<&str> = HashSet::new();
        let mut consumed: HashMap<&str, usize> = HashMap::new();

        for (s, stage) in self.stages.iter().enumerate() {
            if stage.filters.is_empty() {
                return Err(invalid(format!("stage {} has no filters", s)));
            }
            for filter in &stage.filters {
                validate_filter(filter)?;
            }

            for label in &stage.inputs {
                if !self.is_input_stream(label) && !produced.contains(label.as_str()) {
                    return Err(invalid(format!(
                        "stage {} consumes unknown label [{}]",
                        s, label
                    )));
                }
                if !self.is_input_stream(label) {
                    let count = consumed.entry(label.as_str()).or_insert(0);
                    *count += 1;
                    if *count > 1 {
                        return Err(invalid(format!("label [{}] consumed twice", label)));
                    }
                }
            }

            for label in &stage.outputs {
                validate_label(label)?;
                if self.is_input_stream(label) || !produced.insert(label.as_str()) {
                    return Err(invalid(format!("label [{}] produced twice", label)));
                }
            }
        }

        for out in [&self.video_out, &self.audio_out] {
            if !produced.contains(out.as_str()) {
                return Err(invalid(format!("final label [{}] is never produced", out)));
            }
            if consumed.contains_key(out.as_str()) {
                return Err(invalid(format!("final label [{}] is consumed", out)));
            }
        }

        for label in &produced {
            let is_final = *label == self.video_out || *label == self.audio_out;
            if !is_final && !consumed.contains_key(label) {
                return Err(invalid(format!("label [{}] is never consumed", label)));
            }
        }

        Ok(())
    }

    fn is_input_stream(&self, label: &str) -> bool {
        let Some((index, kind)) = label.split_once(':') else {
            return false;
        };
        matches!(kind, "v" | "a")
            && index
                .parse::<usize>()
                .is_ok_and(|i| i < self.inputs.len())
    }
}

fn invalid(message: String) -> CoreError {
    CoreError::InvalidGraph(message)
}

fn validate_label(label: &str) -> CoreResult<()> {
    if label.is_empty()
        || !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(invalid(format!("invalid label [{}]", label)));
    }
    Ok(())
}

fn validate_filter(filter: &Filter) -> CoreResult<()> {
    if filter.name.is_empty()
        || !filter
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(invalid(format!("invalid filter name '{}'", filter.name)));
    }
    for arg in &filter.args {
        if let Some(key) = &arg.key {
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid(format!(
                    "invalid option '{}' on {}",
                    key, filter.name
                )));
            }
        }
        if let ArgValue::Expr(expr) = &arg.value {
            if expr.contains(['\'', '\\', ':', ';', '[', ']']) {
                return Err(invalid(format!(
                    "expression for {} contains reserved characters: {}",
                    filter.name, expr
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_graph() -> FilterGraph {
        let mut graph = FilterGraph::new();
        let img = graph.add_input(
            MediaKind::Image,
            "/tmp/a.png",
            vec![("-loop".into(), "1".into())],
        );
        graph.push_stage(Stage::new(
            vec![FilterGraph::stream_label(img, 'v')],
            vec![
                Filter::new("scale").lit("w", 1080).lit("h", 1920),
                Filter::new("setsar").positional(1),
            ],
            vec!["vout".into()],
        ));
        graph.push_stage(Stage::new(
            vec![],
            vec![Filter::new("anullsrc")
                .lit("r", 44100)
                .lit("cl", "stereo")
                .number("d", 4.0)],
            vec!["aout".into()],
        ));
        graph.video_out = "vout".into();
        graph.audio_out = "aout".into();
        graph
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(escape_ffmpeg_filter_value("C:\\a,b"), r"C\\:\\\\a\,b");
        assert_eq!(escape_ffmpeg_filter_value("plain"), "plain");
    }

    #[test]
    fn test_escape_drawtext_matches_layered_rules() {
        assert_eq!(
            escape_drawtext_value("this is a 'string': may contain one, or more"),
            r"this is a \\\'string\\\'\\: may contain one\, or more"
        );
        assert_eq!(escape_drawtext_value("100%"), r"100\\\\%");
        assert_eq!(escape_drawtext_value("[x];"), r"\[x\]\;");
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(4.0), "4");
        assert_eq!(num(0.48), "0.48");
        assert_eq!(num(1.22), "1.22");
        assert_eq!(num(-0.0), "0");
        assert_eq!(num(f64::NAN), "0");
        assert_eq!(num(1.0 / 3.0), "0.333333");
    }

    #[test]
    fn test_render_filter_complex() {
        let graph = simple_graph();
        assert_eq!(
            graph.to_filter_complex(),
            "[0:v]scale=w=1080:h=1920,setsar=1[vout];anullsrc=r=44100:cl=stereo:d=4[aout]"
        );
    }

    #[test]
    fn test_expr_is_quoted_and_text_escaped() {
        let f = Filter::new("drawtext")
            .text("text", "Hi, there")
            .expr("enable", "gte(t,1)*lt(t,2)");
        assert_eq!(
            f.render(),
            r"drawtext=text=Hi\, there:enable='gte(t,1)*lt(t,2)'"
        );
    }

    #[test]
    fn test_input_args() {
        let graph = simple_graph();
        let args: Vec<String> = graph
            .input_args()
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(args, vec!["-loop", "1", "-i", "/tmp/a.png"]);
        assert_eq!(graph.map_args(), vec!["-map", "[vout]", "-map", "[aout]"]);

        let resolved: Vec<String> = graph
            .input_args_with(|p| Path::new("/stage").join(p.file_name().unwrap()))
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(resolved, vec!["-loop", "1", "-i", "/stage/a.png"]);
        // The graph itself keeps the original path
        assert_eq!(graph.inputs[0].path, PathBuf::from("/tmp/a.png"));
    }

    #[test]
    fn test_validate_accepts_wired_graph() {
        simple_graph().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_unknown_label() {
        let mut graph = simple_graph();
        graph.stages[0].inputs = vec!["ghost".into()];
        assert!(matches!(graph.validate(), Err(CoreError::InvalidGraph(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_input() {
        let mut graph = simple_graph();
        graph.stages[0].inputs = vec!["3:v".into()];
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_dangling_and_duplicate_outputs() {
        let mut graph = simple_graph();
        graph.stages[1].outputs = vec!["vout".into()];
        assert!(graph.validate().is_err());

        let mut graph = simple_graph();
        graph.stages[0].outputs = vec!["v0".into()];
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_quote_in_expr() {
        let mut graph = simple_graph();
        graph.stages[0].filters[0] = Filter::new("scale").expr("w", "iw'");
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let graph = simple_graph();
        let json = graph.to_json_pretty().unwrap();
        assert!(json.contains("\"videoOut\": \"vout\""));
        assert_eq!(FilterGraph::from_json(&json).unwrap(), graph);
    }
}
