//! Terminal rendering of a [`StatsJson`].

use std::fmt::Write as _;

use owo_colors::{OwoColorize, Style};

use super::{StatsJson, StatsOptions};

const CHILD_INDENT: &str = "    ";

pub(super) fn render(json: &StatsJson, options: &StatsOptions) -> String {
    let paint = Paint(options.colors);
    let mut out = String::new();
    render_into(&mut out, json, paint);
    out
}

#[derive(Clone, Copy)]
struct Paint(bool);

impl Paint {
    fn apply(self, text: &str, style: Style) -> String {
        if self.0 {
            text.style(style).to_string()
        } else {
            text.to_owned()
        }
    }

    fn bold(self, text: &str) -> String {
        self.apply(text, Style::new().bold())
    }

    fn green(self, text: &str) -> String {
        self.apply(text, Style::new().green().bold())
    }

    fn yellow(self, text: &str) -> String {
        self.apply(text, Style::new().yellow().bold())
    }

    fn red(self, text: &str) -> String {
        self.apply(text, Style::new().red().bold())
    }
}

fn render_into(out: &mut String, json: &StatsJson, paint: Paint) {
    let _ = writeln!(out, "Hash: {}", paint.bold(&json.hash));
    let _ = writeln!(out, "Version: weft {}", paint.bold(&json.version));
    if let Some(time) = json.time {
        let _ = writeln!(out, "Time: {}ms", paint.bold(&time.to_string()));
    }

    if !json.assets.is_empty() {
        render_assets(out, json, paint);
    }

    for chunk in &json.chunks {
        let mut line = format!(
            "chunk {{{}}} {} ({}) {}",
            paint.yellow(&chunk.id.to_string()),
            paint.green(&chunk.files.join(", ")),
            chunk.names.join(", "),
            chunk.size
        );
        if chunk.entry {
            line.push_str(&paint.green(" [entry]"));
        }
        if chunk.rendered {
            line.push_str(&paint.green(" [rendered]"));
        }
        let _ = writeln!(out, "{line}");
    }

    for module in &json.modules {
        let chunks: Vec<_> = module.chunks.iter().map(|id| format!("{{{id}}}")).collect();
        let mut line = format!(
            "    [{}] {} {} {}",
            module.id,
            paint.bold(&module.name),
            module.size,
            paint.yellow(&chunks.join(" "))
        );
        if module.built {
            line.push_str(&paint.green(" [built]"));
        }
        if module.failed {
            line.push_str(&paint.red(" [failed]"));
        }
        let _ = writeln!(out, "{line}");
    }

    for warning in &json.warnings {
        let _ = writeln!(out, "\n{}\n{}", paint.yellow("WARNING in"), warning);
    }
    for error in &json.errors {
        let _ = writeln!(out, "\n{}\n{}", paint.red("ERROR in"), error);
    }

    for child in &json.children {
        let name = child.name.as_deref().unwrap_or("");
        let _ = writeln!(out, "{} {}:", paint.bold("Child"), paint.bold(name));
        let mut nested = String::new();
        render_into(&mut nested, child, paint);
        for line in nested.lines() {
            if line.is_empty() {
                out.push('\n');
            } else {
                let _ = writeln!(out, "{CHILD_INDENT}{line}");
            }
        }
    }
}

fn render_assets(out: &mut String, json: &StatsJson, paint: Paint) {
    let header = ["Asset", "Size", "Chunks", "", "Chunk Names"];
    let rows: Vec<[String; 5]> = json
        .assets
        .iter()
        .map(|asset| {
            [
                asset.name.clone(),
                asset.size.to_string(),
                asset.chunks.iter().map(u64::to_string).collect::<Vec<_>>().join(", "),
                if asset.emitted { "[emitted]".to_owned() } else { String::new() },
                asset.chunk_names.join(", "),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let header_line = format!(
        "{:>w0$}  {:>w1$}  {:>w2$}  {:w3$}  {}",
        header[0],
        header[1],
        header[2],
        header[3],
        header[4],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
    );
    let _ = writeln!(out, "{}", header_line.trim_end());

    for row in rows {
        // Pad before painting so escape codes do not skew the columns.
        let name = format!("{:>w$}", row[0], w = widths[0]);
        let emitted = format!("{:w$}", row[3], w = widths[3]);
        let line = format!(
            "{}  {:>w1$}  {:>w2$}  {}  {}",
            paint.green(&name),
            row[1],
            row[2],
            paint.green(&emitted),
            row[4],
            w1 = widths[1],
            w2 = widths[2],
        );
        let _ = writeln!(out, "{}", line.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{AssetJson, ChunkJson, ModuleJson};

    fn sample() -> StatsJson {
        StatsJson {
            name: None,
            version: "0.1.0".into(),
            hash: "0123456789abcdef0123".into(),
            time: Some(42),
            errors: vec!["/src/a.js\nModule not found: ./b".into()],
            warnings: Vec::new(),
            assets: vec![AssetJson {
                name: "main.js".into(),
                size: 1200,
                chunks: vec![0],
                chunk_names: vec!["main".into()],
                emitted: true,
            }],
            chunks: vec![ChunkJson {
                id: 0,
                rendered: true,
                entry: true,
                size: 50,
                names: vec!["main".into()],
                files: vec!["main.js".into()],
                parents: Vec::new(),
            }],
            modules: vec![ModuleJson {
                id: 0,
                identifier: "/src/a.js".into(),
                name: "./a.js".into(),
                size: 50,
                chunks: vec![0],
                built: true,
                failed: false,
            }],
            children: Vec::new(),
        }
    }

    #[test]
    fn test_render_plain() {
        let text = render(&sample(), &StatsOptions::default());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Hash: 0123456789abcdef0123");
        assert_eq!(lines[1], "Version: weft 0.1.0");
        assert_eq!(lines[2], "Time: 42ms");
        assert_eq!(lines[3], "  Asset  Size  Chunks             Chunk Names");
        assert_eq!(lines[4], "main.js  1200       0  [emitted]  main");
        assert_eq!(lines[5], "chunk {0} main.js (main) 50 [entry] [rendered]");
        assert_eq!(lines[6], "    [0] ./a.js 50 {0} [built]");
        assert!(text.contains("\nERROR in\n/src/a.js\nModule not found: ./b\n"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_render_children_indented() {
        let mut parent = sample();
        let mut child = sample();
        child.name = Some("worker".into());
        child.time = None;
        child.errors.clear();
        parent.children.push(child);

        let text = render(&parent, &StatsOptions::default());
        assert!(text.contains("Child worker:\n    Hash: 0123456789abcdef0123\n"));
        assert!(text.contains("\n        [0] ./a.js 50 {0} [built]\n"));
    }

    #[test]
    fn test_render_colors() {
        let options = StatsOptions {
            colors: true,
            ..StatsOptions::default()
        };
        let text = render(&sample(), &options);
        assert!(text.contains('\u{1b}'));
    }
}
