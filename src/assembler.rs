//! Page assembly: renders the resolved resources into one HTML document

use crate::builder::PageBuilder;
use crate::error::{Result, Warning};
use crate::filter::{pipe, CssFilter, JsFilter, PassThrough, StreamFilter};
use crate::types::{BuildMode, Category};
use crate::BuildStats;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

const SCRIPT_PROLOGUE: &str = "\"use strict\";\n";

const TEMPLATE_LOADER: &str = r#"
function loadTemplate(name) {
    var tn = document.querySelector("template[data-name=\""+name+"\"]");
    if (!tn) throw new ReferenceError("Template "+name+" was not imported");
    return document.importNode(tn.content, true);
};
"#;

impl PageBuilder {
    /// Write the page to `target_html` and materialize linked files next to it.
    ///
    /// Failing to create the output directory or the page itself is fatal;
    /// every per-file problem is a warning.
    pub fn build(&mut self, target_html: &Path, mode: BuildMode) -> Result<BuildStats> {
        let start = Instant::now();
        let parent = target_html
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        fs::create_dir_all(&parent)?;

        let mut out = BufWriter::new(File::create(target_html)?);
        self.render(&mut out, mode)?;
        out.flush()?;
        drop(out);

        if !mode.is_inline() {
            self.materialize(Category::Style, &parent, mode);
            self.materialize(Category::Script, &parent, mode);
        }
        self.materialize(Category::Resource, &parent, mode);
        self.last_build = Some((target_html.to_path_buf(), mode));

        let stats = BuildStats {
            scripts: self.tables[Category::Script.index()].len(),
            styles: self.tables[Category::Style.index()].len(),
            fragments: self.tables[Category::Page.index()].len(),
            templates: self.tables[Category::Template.index()].len(),
            headers: self.tables[Category::Header.index()].len(),
            resources: self.tables[Category::Resource.index()].len(),
            warning_count: self.warning_count(),
            output_size: fs::metadata(target_html).map(|m| m.len()).unwrap_or(0),
            build_time_ms: start.elapsed().as_millis() as u64,
        };
        log::info!(
            "Built {} ({} mode, {} bytes, {} warnings)",
            target_html.display(),
            mode,
            stats.output_size,
            stats.warning_count
        );
        Ok(stats)
    }

    /// Render the page markup; linked files are referenced by target name
    pub fn render<W: Write>(&mut self, out: &mut W, mode: BuildMode) -> Result<()> {
        let headers = self.sorted_entries(Category::Header);
        let styles = self.sorted_entries(Category::Style);
        let templates = self.sorted_entries(Category::Template);
        let pages = self.sorted_entries(Category::Page);
        let scripts = self.sorted_entries(Category::Script);

        out.write_all(b"<!DOCTYPE html><html><head>")?;
        for (path, _) in &headers {
            self.append_file(out, path, PassThrough)?;
        }

        if mode.is_inline() {
            if !styles.is_empty() {
                out.write_all(b"<style>\n")?;
                for (path, _) in &styles {
                    self.append_file(out, path, CssFilter::new())?;
                }
                out.write_all(b"\n</style>")?;
            }
        } else {
            for (_, target) in &styles {
                write!(out, "<link rel=\"stylesheet\" href=\"{}\">", escape_attr(target))?;
            }
        }
        out.write_all(b"</head><body>")?;

        for (path, target) in &templates {
            let Some(content) = self.read_or_warn(path) else {
                continue;
            };
            write!(out, "<template data-name=\"{}\">", escape_attr(target))?;
            out.write_all(&content)?;
            out.write_all(b"</template>")?;
        }
        for (path, _) in &pages {
            self.append_file(out, path, PassThrough)?;
        }

        out.write_all(b"<script type=\"text/javascript\">\n")?;
        out.write_all(SCRIPT_PROLOGUE.as_bytes())?;
        if !templates.is_empty() {
            out.write_all(TEMPLATE_LOADER.as_bytes())?;
        }
        if mode.is_inline() {
            for (path, _) in &scripts {
                if self.append_file(out, path, JsFilter::new())? {
                    out.write_all(b";\n")?;
                }
            }
        }
        out.write_all(b"</script>")?;

        if !mode.is_inline() {
            for (_, target) in &scripts {
                write!(
                    out,
                    "<script type=\"text/javascript\" src=\"{}\"></script>",
                    escape_attr(target)
                )?;
            }
        }
        out.write_all(b"</body></html>")?;
        Ok(())
    }

    /// Run one file through `filter`; `false` when it could not be read.
    ///
    /// The file is read completely first, so only write errors are fatal.
    fn append_file<W, F>(&mut self, out: &mut W, path: &Path, filter: F) -> Result<bool>
    where
        W: Write,
        F: StreamFilter,
    {
        match self.read_or_warn(path) {
            Some(content) => {
                pipe(content.as_slice(), out, filter)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn read_or_warn(&mut self, path: &Path) -> Option<Vec<u8>> {
        match fs::read(path) {
            Ok(content) => Some(content),
            Err(e) => {
                self.report(Warning::for_file(path, format!("Failed to read file: {}", e)));
                None
            }
        }
    }
}

/// Escape a value for a double-quoted HTML attribute
fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
