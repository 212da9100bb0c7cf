//! Per-candidate diagnostics produced by overload resolution.
//!
//! Every candidate considered for a call gets one [`CandidateDiagnostic`].
//! When no candidate is viable the whole set travels inside
//! [`ReflectError::NoViableOverload`](crate::ReflectError::NoViableOverload),
//! together with the index of the candidate that came closest.

use std::fmt;

/// Outcome code for a single candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// Viable; `cost` holds its total conversion cost.
    Ok,
    /// Declared arity differs from the argument count.
    ArityMismatch,
    /// Some argument cannot be converted; `argument` holds its index.
    NotConvertible,
}

/// Why a candidate was or was not viable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateDiagnostic {
    /// Declaration index of the candidate within its overload set.
    pub candidate: usize,
    pub code: DiagnosticCode,
    /// First failing argument, for [`DiagnosticCode::NotConvertible`].
    pub argument: Option<usize>,
    pub declared_arity: usize,
    pub cost: u32,
}

impl fmt::Display for CandidateDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "candidate #{}: ", self.candidate)?;
        match self.code {
            DiagnosticCode::Ok => write!(f, "viable (cost {})", self.cost),
            DiagnosticCode::ArityMismatch => {
                write!(f, "expects {} argument(s)", self.declared_arity)
            }
            DiagnosticCode::NotConvertible => match self.argument {
                Some(index) => write!(f, "argument {index} is not convertible"),
                None => write!(f, "arguments are not convertible"),
            },
        }
    }
}

/// Diagnostics for one overload resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverloadDiagnostics {
    pub candidates: Vec<CandidateDiagnostic>,
    /// Position in `candidates` of the closest candidate, if any were tried.
    pub closest: Option<usize>,
}

impl OverloadDiagnostics {
    /// The closest candidate's diagnostic.
    pub fn closest(&self) -> Option<&CandidateDiagnostic> {
        self.closest.and_then(|i| self.candidates.get(i))
    }

    /// True when no candidate was examined at all.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl fmt::Display for OverloadDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.candidates.is_empty() {
            return write!(f, "no candidates");
        }
        for (i, diagnostic) in self.candidates.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{diagnostic}")?;
        }
        if let Some(closest) = self.closest() {
            write!(f, " (closest: #{})", closest.candidate)?;
        }
        Ok(())
    }
}
