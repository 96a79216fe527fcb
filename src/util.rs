use std::{
    fs::File,
    io::{stdout, BufWriter},
    path::Path,
};

/// A count with its noun, pluralized by appending "s", for log and summary
/// lines.
pub struct Counted<'a> {
    singular: &'a str,
    count: usize,
}

impl<'a> Counted<'a> {
    pub fn regular(count: usize, singular: &'a str) -> Self {
        Counted { singular, count }
    }
}

impl std::fmt::Display for Counted<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Counted { singular, count } = self;
        write!(f, "{} {}{}", count, singular, if *count == 1 { "" } else { "s" })
    }
}

/// Buffered writer for `path`, or stdout when no path is given.
pub fn get_writer_for_file_or_stdout<P: AsRef<Path>>(
    path: Option<P>,
) -> std::io::Result<Box<dyn std::io::Write>> {
    match path {
        None => Ok(Box::new(BufWriter::new(stdout()))),
        Some(p) => Ok(Box::new(BufWriter::new(File::create(p)?))),
    }
}

/// Turn a product or account name into something safe to use in a file name.
pub fn file_safe_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned.to_string()
    }
}
