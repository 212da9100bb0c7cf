//! Per-parameter conversion ranking.
//!
//! Every (argument type, parameter type) pair gets a [`ParamRank`]: a cost
//! and whether the conversion may lose information. Only exact matches and
//! conversions between numeric primitives are viable; anything else costs
//! [`ParamRank::COST_NOT_VIABLE`].

use refract_core::{NumericClass, PrimitiveKind, TypeHash};

/// Cost of passing one argument to one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamRank {
    pub cost: u32,
    /// The conversion may lose range or precision.
    pub narrowing: bool,
}

impl ParamRank {
    // Costs are ordered so that cheaper always means "closer to the
    // declared type".

    /// Same type.
    pub const COST_EXACT: u32 = 0;
    /// Same numeric class, wider type.
    pub const COST_PROMOTION: u32 = 1;
    /// Same class and width but a different type, or integer to float.
    pub const COST_CONVERSION: u32 = 3;
    /// Narrower type in the same class, or a change of signedness.
    pub const COST_SIGN_OR_NARROWING: u32 = 4;
    /// Float to integer.
    pub const COST_FLOAT_TO_INT: u32 = 5;
    /// No implicit conversion exists.
    pub const COST_NOT_VIABLE: u32 = 1000;

    pub const EXACT: ParamRank = ParamRank::new(Self::COST_EXACT, false);
    pub const NOT_VIABLE: ParamRank = ParamRank::new(Self::COST_NOT_VIABLE, false);

    const fn new(cost: u32, narrowing: bool) -> Self {
        ParamRank { cost, narrowing }
    }

    #[inline]
    pub const fn is_exact(self) -> bool {
        self.cost == Self::COST_EXACT
    }

    #[inline]
    pub const fn is_viable(self) -> bool {
        self.cost < Self::COST_NOT_VIABLE
    }
}

/// Rank passing a value of type `from` to a parameter of type `to`.
pub fn rank(from: TypeHash, to: TypeHash) -> ParamRank {
    if from == to {
        return ParamRank::EXACT;
    }
    match (PrimitiveKind::from_hash(from), PrimitiveKind::from_hash(to)) {
        (Some(from), Some(to)) => rank_primitives(from, to),
        _ => ParamRank::NOT_VIABLE,
    }
}

/// Rank a primitive-to-primitive conversion.
pub fn rank_primitives(from: PrimitiveKind, to: PrimitiveKind) -> ParamRank {
    if from == to {
        return ParamRank::EXACT;
    }
    let (Some(from_class), Some(to_class)) = (from.numeric_class(), to.numeric_class()) else {
        return ParamRank::NOT_VIABLE;
    };

    match (from_class, to_class) {
        (a, b) if a == b => {
            if to.rank() > from.rank() {
                ParamRank::new(ParamRank::COST_PROMOTION, false)
            } else if to.rank() == from.rank() {
                ParamRank::new(ParamRank::COST_CONVERSION, false)
            } else {
                ParamRank::new(ParamRank::COST_SIGN_OR_NARROWING, true)
            }
        }
        (_, NumericClass::Float) => ParamRank::new(ParamRank::COST_CONVERSION, false),
        (NumericClass::Float, _) => ParamRank::new(ParamRank::COST_FLOAT_TO_INT, true),
        // signed <-> unsigned
        _ => ParamRank::new(ParamRank::COST_SIGN_OR_NARROWING, to.rank() < from.rank()),
    }
}
