//! Diagnostics sink. The CLI prints to stderr; tests collect.

/// Receiver for per-file progress and error messages.
pub trait Diagnostics {
    fn info(&mut self, file: &str, message: &str);
    fn error(&mut self, file: &str, message: &str);
}

/// Prints diagnostics to stderr, one line each.
#[derive(Debug, Default)]
pub struct StderrDiagnostics;

impl Diagnostics for StderrDiagnostics {
    fn info(&mut self, file: &str, message: &str) {
        eprintln!("{file}: {message}");
    }

    fn error(&mut self, file: &str, message: &str) {
        eprintln!("error: {file}: {message}");
    }
}

/// Collects diagnostics in memory for assertions.
#[derive(Debug, Default)]
pub struct CollectedDiagnostics {
    pub infos: Vec<String>,
    pub errors: Vec<String>,
}

impl Diagnostics for CollectedDiagnostics {
    fn info(&mut self, file: &str, message: &str) {
        self.infos.push(format!("{file}: {message}"));
    }

    fn error(&mut self, file: &str, message: &str) {
        self.errors.push(format!("{file}: {message}"));
    }
}
