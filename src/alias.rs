//! Per-application command aliases.
//!
//! Every application name owns an [`AliasTable`]. Tables are created lazily on
//! the first definition and dropped when the application disconnects.
//!
//! # Macro grammar
//!
//! ```text
//! $1 .. $9   Nth argument after the alias name (empty if absent)
//! $*         every argument, verbatim
//! $L $G $B   < > |
//! $T         line separator (one alias, several submitted lines)
//! $X         any other character is copied as `$X`
//! ```

use tracing::debug;

use crate::error::{ConsoleError, Result};
use crate::text::eq_ignore_case;

/// Line terminator appended after every expanded line
pub const LINE_TERMINATOR: &str = "\r\n";

/// A single alias definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    pub source: String,
    pub target: String,
}

/// Aliases of one application, most recently used first
#[derive(Debug, Clone)]
pub struct AliasTable {
    app_name: String,
    entries: Vec<AliasEntry>,
}

impl AliasTable {
    fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            entries: Vec::new(),
        }
    }

    /// Owning application name
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, source: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| eq_ignore_case(&e.source, source))
    }

    fn define(&mut self, source: &str, target: &str) -> Result<()> {
        let existing = self.position(source);
        if target.is_empty() {
            if let Some(idx) = existing {
                self.entries.remove(idx);
            }
            return Ok(());
        }

        match existing {
            Some(idx) => {
                let mut new_target = String::new();
                new_target.try_reserve(target.len())?;
                new_target.push_str(target);
                let mut entry = self.entries.remove(idx);
                entry.target = new_target;
                self.entries.insert(0, entry);
            }
            None => {
                self.entries.try_reserve(1)?;
                let mut entry = AliasEntry {
                    source: String::new(),
                    target: String::new(),
                };
                entry.source.try_reserve(source.len())?;
                entry.target.try_reserve(target.len())?;
                entry.source.push_str(source);
                entry.target.push_str(target);
                self.entries.insert(0, entry);
            }
        }
        Ok(())
    }

    /// Find an alias and promote it to most recently used
    fn lookup(&mut self, source: &str) -> Option<&AliasEntry> {
        let idx = self.position(source)?;
        if idx != 0 {
            let entry = self.entries.remove(idx);
            self.entries.insert(0, entry);
        }
        self.entries.first()
    }
}

/// Result of expanding a command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// Expanded text; every line ends with CR/LF when an alias matched
    pub text: String,
    /// Number of submitted lines
    pub line_count: usize,
}

/// All alias tables, keyed by application name
#[derive(Debug, Default)]
pub struct AliasStore {
    tables: Vec<AliasTable>,
}

impl AliasStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, app: &str) -> Option<&AliasTable> {
        self.tables.iter().find(|t| eq_ignore_case(&t.app_name, app))
    }

    fn table_mut(&mut self, app: &str) -> Option<&mut AliasTable> {
        self.tables
            .iter_mut()
            .find(|t| eq_ignore_case(&t.app_name, app))
    }

    /// Define, replace or (with an empty target) remove an alias
    pub fn define(&mut self, app: &str, source: &str, target: &str) -> Result<()> {
        if source.is_empty() {
            return Err(ConsoleError::InvalidArgument("alias source is empty"));
        }

        if let Some(table) = self.table_mut(app) {
            table.define(source, target)?;
        } else if !target.is_empty() {
            self.tables.try_reserve(1)?;
            let mut table = AliasTable::new(app);
            table.define(source, target)?;
            self.tables.push(table);
        }

        debug!(app, source, removed = target.is_empty(), "alias defined");
        Ok(())
    }

    /// Look up an alias target, promoting the entry on a hit
    pub fn lookup(&mut self, app: &str, source: &str) -> Option<String> {
        self.table_mut(app)?
            .lookup(source)
            .map(|e| e.target.clone())
    }

    /// Aliases of one application, most recently used first
    pub fn list(&self, app: &str) -> Vec<AliasEntry> {
        self.table(app)
            .map(|t| t.entries.to_vec())
            .unwrap_or_default()
    }

    /// Names of applications that own at least one alias
    pub fn applications(&self) -> Vec<String> {
        self.tables
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| t.app_name.clone())
            .collect()
    }

    /// `source=target\0` for every alias of `app`
    pub fn flatten(&self, app: &str) -> String {
        let mut out = String::new();
        for entry in self.table(app).map(|t| t.entries()).unwrap_or_default() {
            out.push_str(&entry.source);
            out.push('=');
            out.push_str(&entry.target);
            out.push('\0');
        }
        out
    }

    /// `app\0` for every application with aliases
    pub fn flatten_applications(&self) -> String {
        let mut out = String::new();
        for name in self.applications() {
            out.push_str(&name);
            out.push('\0');
        }
        out
    }

    /// Drop every alias of `app` but keep its table
    pub fn clear(&mut self, app: &str) {
        if let Some(table) = self.table_mut(app) {
            table.entries.clear();
        }
    }

    /// Drop the table of a disconnected application
    pub fn remove_application(&mut self, app: &str) {
        self.tables.retain(|t| !eq_ignore_case(&t.app_name, app));
    }

    /// Expand `line` for `app`.
    ///
    /// Returns the line unchanged with a line count of one when no alias
    /// matches. `capacity` bounds the expansion in characters.
    pub fn expand(&mut self, app: &str, line: &str, capacity: usize) -> Result<Expansion> {
        let trimmed = trim_line_terminator(line);
        let unchanged = || Expansion {
            text: line.to_string(),
            line_count: 1,
        };

        let (name, remainder) = match trimmed.find(' ') {
            Some(idx) => (&trimmed[..idx], trimmed[idx..].trim_start_matches(' ')),
            None => (trimmed, ""),
        };
        if name.is_empty() {
            return Ok(unchanged());
        }

        let Some(target) = self.lookup(app, name) else {
            return Ok(unchanged());
        };

        let expansion = substitute(&target, remainder);
        let required = expansion.text.chars().count();
        if required > capacity {
            return Err(ConsoleError::BufferTooSmall { required });
        }

        debug!(app, alias = name, lines = expansion.line_count, "alias expanded");
        Ok(expansion)
    }
}

fn trim_line_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Replace macros in an alias target
fn substitute(target: &str, args: &str) -> Expansion {
    let tokens: Vec<&str> = args.split(' ').filter(|t| !t.is_empty()).collect();
    let mut text = String::with_capacity(target.len() + args.len() + 2);
    let mut line_count = 1;

    let mut chars = target.chars();
    while let Some(ch) = chars.next() {
        if ch != '$' {
            text.push(ch);
            continue;
        }

        let Some(macro_ch) = chars.next() else {
            text.push('$');
            break;
        };

        match macro_ch {
            '1'..='9' => {
                let index = macro_ch as usize - '1' as usize;
                if let Some(token) = tokens.get(index) {
                    text.push_str(token);
                }
            }
            '*' => text.push_str(args),
            'L' | 'l' => text.push('<'),
            'G' | 'g' => text.push('>'),
            'B' | 'b' => text.push('|'),
            'T' | 't' => {
                text.push_str(LINE_TERMINATOR);
                line_count += 1;
            }
            other => {
                text.push('$');
                text.push(other);
            }
        }
    }

    text.push_str(LINE_TERMINATOR);
    Expansion { text, line_count }
}
