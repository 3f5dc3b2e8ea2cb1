//! Power schemes, a non-registry setting driven through `powercfg`.

pub mod parsing;
pub mod plan;

pub use parsing::{SchemeEntry, parse_active_scheme, parse_duplicated_scheme, parse_scheme_list};
pub use plan::{BALANCED, PowerPlan, PowerPlanCatalog, ULTIMATE_PERFORMANCE};
