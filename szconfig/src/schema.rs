//! Table names, key fields and declared foreign keys.
//!
//! The configuration document carries no constraints of its own. Uniqueness
//! of codes is checked by the services before insert; references between
//! tables are declared here once and drive every delete through
//! [`references_to`].

pub const CFG_DSRC: &str = "CFG_DSRC";
pub const CFG_FTYPE: &str = "CFG_FTYPE";
pub const CFG_FCLASS: &str = "CFG_FCLASS";
pub const CFG_FELEM: &str = "CFG_FELEM";
pub const CFG_FBOM: &str = "CFG_FBOM";
pub const CFG_ATTR: &str = "CFG_ATTR";

pub const CFG_CFUNC: &str = "CFG_CFUNC";
pub const CFG_CFCALL: &str = "CFG_CFCALL";
pub const CFG_CFBOM: &str = "CFG_CFBOM";
pub const CFG_CFRTN: &str = "CFG_CFRTN";

pub const CFG_EFUNC: &str = "CFG_EFUNC";
pub const CFG_EFCALL: &str = "CFG_EFCALL";
pub const CFG_EFBOM: &str = "CFG_EFBOM";

pub const CFG_SFUNC: &str = "CFG_SFUNC";
pub const CFG_SFCALL: &str = "CFG_SFCALL";

pub const CFG_DFUNC: &str = "CFG_DFUNC";
pub const CFG_DFCALL: &str = "CFG_DFCALL";
pub const CFG_DFBOM: &str = "CFG_DFBOM";

pub const CFG_ERRULE: &str = "CFG_ERRULE";
pub const CFG_ERFRAG: &str = "CFG_ERFRAG";
pub const CFG_RTYPE: &str = "CFG_RTYPE";

pub const CFG_GPLAN: &str = "CFG_GPLAN";
pub const CFG_GENERIC_THRESHOLD: &str = "CFG_GENERIC_THRESHOLD";
pub const CFG_FBOVR: &str = "CFG_FBOVR";

pub const CFG_SPARM: &str = "CFG_SPARM";
pub const CONFIG_BASE_VERSION: &str = "CONFIG_BASE_VERSION";

/// `FTYPE_ID` value meaning "every feature".
pub const ALL_FEATURES_ID: i64 = 0;
/// External spelling of [`ALL_FEATURES_ID`].
pub const ALL_FEATURES: &str = "ALL";
/// Reference value meaning "no row".
pub const NO_REFERENCE: i64 = -1;

/// First ID handed out for user-created rows.
pub const USER_ID_SEED: i64 = 1000;

/// Classes an attribute can be filed under.
pub const ATTRIBUTE_CLASSES: &[&str] = &[
    "ATTRIBUTE",
    "NAME",
    "ADDRESS",
    "PHONE",
    "IDENTIFIER",
    "RELATIONSHIP",
    "OTHER",
];

/// Feature frequency codes and what they mean. A behavior is one of these,
/// optionally followed by `E` (exclusive) and `S` (stable).
pub const BEHAVIOR_CODES: &[(&str, &str)] = &[
    ("A1", "Absolutely 1"),
    ("F1", "Frequency 1"),
    ("FF", "Frequency few"),
    ("FM", "Frequency many"),
    ("FVM", "Frequency very many"),
    ("NAME", "Name"),
    ("NONE", "No behavior"),
];

/// What happens to referencing rows when their parent is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// Refuse the delete while referencing rows exist.
    Restrict,
    /// Delete referencing rows together with the parent.
    Cascade,
}

/// A column of `table` holding values of `parent.parent_field`.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub table: &'static str,
    pub field: &'static str,
    pub parent: &'static str,
    pub parent_field: &'static str,
    pub on_delete: OnDelete,
}

const fn fk(
    table: &'static str,
    field: &'static str,
    parent: &'static str,
    parent_field: &'static str,
    on_delete: OnDelete,
) -> ForeignKey {
    ForeignKey {
        table,
        field,
        parent,
        parent_field,
        on_delete,
    }
}

use OnDelete::{Cascade, Restrict};

/// Every reference between configuration tables.
pub const FOREIGN_KEYS: &[ForeignKey] = &[
    // features
    fk(CFG_ATTR, "FTYPE_CODE", CFG_FTYPE, "FTYPE_CODE", Restrict),
    fk(CFG_FBOM, "FTYPE_ID", CFG_FTYPE, "FTYPE_ID", Cascade),
    fk(CFG_CFCALL, "FTYPE_ID", CFG_FTYPE, "FTYPE_ID", Cascade),
    fk(CFG_EFCALL, "FTYPE_ID", CFG_FTYPE, "FTYPE_ID", Cascade),
    fk(CFG_SFCALL, "FTYPE_ID", CFG_FTYPE, "FTYPE_ID", Cascade),
    fk(CFG_DFCALL, "FTYPE_ID", CFG_FTYPE, "FTYPE_ID", Cascade),
    fk(CFG_CFRTN, "FTYPE_ID", CFG_FTYPE, "FTYPE_ID", Cascade),
    fk(CFG_FBOVR, "FTYPE_ID", CFG_FTYPE, "FTYPE_ID", Cascade),
    fk(CFG_GENERIC_THRESHOLD, "FTYPE_ID", CFG_FTYPE, "FTYPE_ID", Cascade),
    fk(CFG_EFCALL, "EFEAT_FTYPE_ID", CFG_FTYPE, "FTYPE_ID", Restrict),
    fk(CFG_CFBOM, "FTYPE_ID", CFG_FTYPE, "FTYPE_ID", Restrict),
    fk(CFG_EFBOM, "FTYPE_ID", CFG_FTYPE, "FTYPE_ID", Restrict),
    fk(CFG_DFBOM, "FTYPE_ID", CFG_FTYPE, "FTYPE_ID", Restrict),
    // feature classes
    fk(CFG_FTYPE, "FCLASS_ID", CFG_FCLASS, "FCLASS_ID", Restrict),
    // elements
    fk(CFG_FBOM, "FELEM_ID", CFG_FELEM, "FELEM_ID", Restrict),
    fk(CFG_ATTR, "FELEM_CODE", CFG_FELEM, "FELEM_CODE", Restrict),
    fk(CFG_CFBOM, "FELEM_ID", CFG_FELEM, "FELEM_ID", Restrict),
    fk(CFG_EFBOM, "FELEM_ID", CFG_FELEM, "FELEM_ID", Restrict),
    fk(CFG_DFBOM, "FELEM_ID", CFG_FELEM, "FELEM_ID", Restrict),
    fk(CFG_EFCALL, "FELEM_ID", CFG_FELEM, "FELEM_ID", Restrict),
    fk(CFG_SFCALL, "FELEM_ID", CFG_FELEM, "FELEM_ID", Restrict),
    // functions
    fk(CFG_CFCALL, "CFUNC_ID", CFG_CFUNC, "CFUNC_ID", Restrict),
    fk(CFG_CFRTN, "CFUNC_ID", CFG_CFUNC, "CFUNC_ID", Cascade),
    fk(CFG_EFCALL, "EFUNC_ID", CFG_EFUNC, "EFUNC_ID", Restrict),
    fk(CFG_SFCALL, "SFUNC_ID", CFG_SFUNC, "SFUNC_ID", Restrict),
    fk(CFG_DFCALL, "DFUNC_ID", CFG_DFUNC, "DFUNC_ID", Restrict),
    // calls
    fk(CFG_CFBOM, "CFCALL_ID", CFG_CFCALL, "CFCALL_ID", Cascade),
    fk(CFG_EFBOM, "EFCALL_ID", CFG_EFCALL, "EFCALL_ID", Cascade),
    fk(CFG_DFBOM, "DFCALL_ID", CFG_DFCALL, "DFCALL_ID", Cascade),
    // rules
    fk(CFG_ERRULE, "QUAL_ERFRAG_CODE", CFG_ERFRAG, "ERFRAG_CODE", Restrict),
    fk(CFG_ERRULE, "DISQ_ERFRAG_CODE", CFG_ERFRAG, "ERFRAG_CODE", Restrict),
    fk(CFG_ERRULE, "RTYPE_ID", CFG_RTYPE, "RTYPE_ID", Restrict),
    // scoring plans
    fk(CFG_GENERIC_THRESHOLD, "GPLAN_ID", CFG_GPLAN, "GPLAN_ID", Cascade),
];

/// Foreign keys pointing at `parent`.
pub fn references_to(parent: &str) -> impl Iterator<Item = &'static ForeignKey> + use<'_> {
    FOREIGN_KEYS.iter().filter(move |k| k.parent == parent)
}

/// The four function families and the tables each one lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Comparison,
    Expression,
    Standardize,
    Distinct,
}

impl FunctionKind {
    pub const ALL: [FunctionKind; 4] = [
        FunctionKind::Comparison,
        FunctionKind::Expression,
        FunctionKind::Standardize,
        FunctionKind::Distinct,
    ];

    /// Lower-case family name used in messages.
    pub fn label(self) -> &'static str {
        match self {
            FunctionKind::Comparison => "comparison",
            FunctionKind::Expression => "expression",
            FunctionKind::Standardize => "standardize",
            FunctionKind::Distinct => "distinct",
        }
    }

    pub fn function_table(self) -> &'static str {
        match self {
            FunctionKind::Comparison => CFG_CFUNC,
            FunctionKind::Expression => CFG_EFUNC,
            FunctionKind::Standardize => CFG_SFUNC,
            FunctionKind::Distinct => CFG_DFUNC,
        }
    }

    pub fn function_id(self) -> &'static str {
        match self {
            FunctionKind::Comparison => "CFUNC_ID",
            FunctionKind::Expression => "EFUNC_ID",
            FunctionKind::Standardize => "SFUNC_ID",
            FunctionKind::Distinct => "DFUNC_ID",
        }
    }

    pub fn function_code(self) -> &'static str {
        match self {
            FunctionKind::Comparison => "CFUNC_CODE",
            FunctionKind::Expression => "EFUNC_CODE",
            FunctionKind::Standardize => "SFUNC_CODE",
            FunctionKind::Distinct => "DFUNC_CODE",
        }
    }

    pub fn function_desc(self) -> &'static str {
        match self {
            FunctionKind::Comparison => "CFUNC_DESC",
            FunctionKind::Expression => "EFUNC_DESC",
            FunctionKind::Standardize => "SFUNC_DESC",
            FunctionKind::Distinct => "DFUNC_DESC",
        }
    }

    pub fn call_table(self) -> &'static str {
        match self {
            FunctionKind::Comparison => CFG_CFCALL,
            FunctionKind::Expression => CFG_EFCALL,
            FunctionKind::Standardize => CFG_SFCALL,
            FunctionKind::Distinct => CFG_DFCALL,
        }
    }

    pub fn call_id(self) -> &'static str {
        match self {
            FunctionKind::Comparison => "CFCALL_ID",
            FunctionKind::Expression => "EFCALL_ID",
            FunctionKind::Standardize => "SFCALL_ID",
            FunctionKind::Distinct => "DFCALL_ID",
        }
    }

    /// Bill-of-materials table listing the elements a call consumes.
    /// Standardize calls name their element directly and have none.
    pub fn bom_table(self) -> Option<&'static str> {
        match self {
            FunctionKind::Comparison => Some(CFG_CFBOM),
            FunctionKind::Expression => Some(CFG_EFBOM),
            FunctionKind::Standardize => None,
            FunctionKind::Distinct => Some(CFG_DFBOM),
        }
    }
}

/// Human name of the entity stored in a table, for messages.
pub fn entity_name(table: &str) -> &'static str {
    match table {
        CFG_DSRC => "data source",
        CFG_FTYPE => "feature",
        CFG_FCLASS => "feature class",
        CFG_FELEM => "element",
        CFG_FBOM => "feature element",
        CFG_ATTR => "attribute",
        CFG_CFUNC => "comparison function",
        CFG_EFUNC => "expression function",
        CFG_SFUNC => "standardize function",
        CFG_DFUNC => "distinct function",
        CFG_CFCALL => "comparison call",
        CFG_EFCALL => "expression call",
        CFG_SFCALL => "standardize call",
        CFG_DFCALL => "distinct call",
        CFG_CFBOM | CFG_EFBOM | CFG_DFBOM => "call element",
        CFG_CFRTN => "comparison threshold",
        CFG_ERRULE => "rule",
        CFG_ERFRAG => "fragment",
        CFG_RTYPE => "match level",
        CFG_GPLAN => "generic plan",
        CFG_GENERIC_THRESHOLD => "generic threshold",
        CFG_FBOVR => "behavior override",
        CFG_SPARM => "system parameter",
        _ => "record",
    }
}
