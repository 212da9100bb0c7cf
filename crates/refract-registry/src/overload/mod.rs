//! Overload resolution for methods, constructors and global functions.
//!
//! ## Algorithm
//!
//! 1. Reject candidates whose arity differs from the argument count
//! 2. Rank every argument against its parameter (see [`ranking`])
//! 3. Score each viable candidate as `(total cost, narrowing count,
//!    conversion count, declaration index)`
//! 4. Pick the lexicographically smallest score
//!
//! The declaration index is the last key, so resolution is deterministic:
//! when two overloads tie, the one declared first wins.
//!
//! Every candidate leaves a [`CandidateDiagnostic`] behind. When nothing is
//! viable, the diagnostics name the candidate that came closest.

pub mod ranking;

use refract_core::{CandidateDiagnostic, DiagnosticCode, OverloadDiagnostics, TypeHash};
use tracing::trace;

use crate::descriptor::{ConstructorDescriptor, FunctionDescriptor, MethodDescriptor};
use ranking::rank;

pub use ranking::ParamRank;

/// Something with a parameter list that can take part in resolution.
pub trait Candidate {
    fn params(&self) -> &[TypeHash];
}

impl Candidate for MethodDescriptor {
    fn params(&self) -> &[TypeHash] {
        &self.params
    }
}

impl Candidate for ConstructorDescriptor {
    fn params(&self) -> &[TypeHash] {
        &self.params
    }
}

impl Candidate for FunctionDescriptor {
    fn params(&self) -> &[TypeHash] {
        &self.params
    }
}

impl Candidate for [TypeHash] {
    fn params(&self) -> &[TypeHash] {
        self
    }
}

impl Candidate for Vec<TypeHash> {
    fn params(&self) -> &[TypeHash] {
        self
    }
}

/// Ordering key of a viable candidate. Smaller is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score {
    pub cost: u32,
    pub narrowing: u32,
    pub conversions: u32,
    /// Declaration index within the overload set.
    pub index: usize,
}

/// How one argument reaches its parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgBinding {
    /// The argument already has the parameter type.
    Exact,
    /// The argument is converted on the way in.
    Convert,
}

/// Result of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Declaration index of the selected candidate.
    pub index: usize,
    pub score: Score,
    /// One entry per argument.
    pub bindings: Vec<ArgBinding>,
    /// Diagnostics for every candidate, the selected one included.
    pub diagnostics: OverloadDiagnostics,
}

impl Resolution {
    /// True when no argument needs a conversion.
    pub fn is_exact(&self) -> bool {
        self.bindings.iter().all(|b| *b == ArgBinding::Exact)
    }
}

// Synthetic distances used only to pick the closest candidate for
// diagnostics. Arity mismatches always rank behind conversion failures.
const ARITY_DISTANCE: u64 = 10_000;
const PER_ARITY_STEP: u64 = 1_000;
const PER_FAILED_ARG: u64 = 1_000;

/// Select the best candidate for arguments of types `args`.
///
/// # Arguments
///
/// * `candidates` - The overload set, in declaration order
/// * `args` - Type hashes of the call's arguments
///
/// # Returns
///
/// * `Ok(Resolution)` - The best candidate with its argument bindings
/// * `Err(OverloadDiagnostics)` - No candidate is viable
pub fn resolve<'c, C>(
    candidates: impl IntoIterator<Item = &'c C>,
    args: &[TypeHash],
) -> Result<Resolution, OverloadDiagnostics>
where
    C: Candidate + ?Sized + 'c,
{
    let mut diagnostics = OverloadDiagnostics::default();
    let mut best: Option<(Score, Vec<ArgBinding>)> = None;
    let mut closest: Option<(u64, usize)> = None;

    for (index, candidate) in candidates.into_iter().enumerate() {
        let params = candidate.params();
        let (diagnostic, distance) = match evaluate(index, params, args) {
            Evaluation::Viable(score, bindings) => {
                let distance = u64::from(score.cost);
                if best.as_ref().is_none_or(|(current, _)| score < *current) {
                    best = Some((score, bindings));
                }
                (
                    CandidateDiagnostic {
                        candidate: index,
                        code: DiagnosticCode::Ok,
                        argument: None,
                        declared_arity: params.len(),
                        cost: score.cost,
                    },
                    distance,
                )
            }
            Evaluation::ArityMismatch => {
                let diff = params.len().abs_diff(args.len()) as u64;
                (
                    CandidateDiagnostic {
                        candidate: index,
                        code: DiagnosticCode::ArityMismatch,
                        argument: None,
                        declared_arity: params.len(),
                        cost: ParamRank::COST_NOT_VIABLE,
                    },
                    ARITY_DISTANCE + diff * PER_ARITY_STEP,
                )
            }
            Evaluation::NotConvertible {
                first,
                failed,
                viable_cost,
            } => (
                CandidateDiagnostic {
                    candidate: index,
                    code: DiagnosticCode::NotConvertible,
                    argument: Some(first),
                    declared_arity: params.len(),
                    cost: ParamRank::COST_NOT_VIABLE,
                },
                failed as u64 * PER_FAILED_ARG + u64::from(viable_cost),
            ),
        };

        if closest.is_none_or(|(d, _)| distance < d) {
            closest = Some((distance, diagnostics.candidates.len()));
        }
        diagnostics.candidates.push(diagnostic);
    }
    diagnostics.closest = closest.map(|(_, position)| position);

    match best {
        Some((score, bindings)) => {
            trace!(
                candidate = score.index,
                cost = score.cost,
                narrowing = score.narrowing,
                "overload selected"
            );
            Ok(Resolution {
                index: score.index,
                score,
                bindings,
                diagnostics,
            })
        }
        None => {
            trace!(candidates = diagnostics.candidates.len(), "no viable overload");
            Err(diagnostics)
        }
    }
}

enum Evaluation {
    Viable(Score, Vec<ArgBinding>),
    ArityMismatch,
    NotConvertible {
        first: usize,
        failed: usize,
        viable_cost: u32,
    },
}

fn evaluate(index: usize, params: &[TypeHash], args: &[TypeHash]) -> Evaluation {
    if params.len() != args.len() {
        return Evaluation::ArityMismatch;
    }

    let mut score = Score {
        cost: 0,
        narrowing: 0,
        conversions: 0,
        index,
    };
    let mut bindings = Vec::with_capacity(args.len());
    let mut first_failure = None;
    let mut failed = 0;

    for (position, (&arg, &param)) in args.iter().zip(params).enumerate() {
        let rank = rank(arg, param);
        if !rank.is_viable() {
            first_failure.get_or_insert(position);
            failed += 1;
            continue;
        }

        score.cost += rank.cost;
        if rank.narrowing {
            score.narrowing += 1;
        }
        if rank.is_exact() {
            bindings.push(ArgBinding::Exact);
        } else {
            score.conversions += 1;
            bindings.push(ArgBinding::Convert);
        }
    }

    match first_failure {
        Some(first) => Evaluation::NotConvertible {
            first,
            failed,
            viable_cost: score.cost,
        },
        None => Evaluation::Viable(score, bindings),
    }
}
