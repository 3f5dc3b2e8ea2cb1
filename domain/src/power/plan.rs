//! Power plans and the catalog of known plans

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the plan created on demand from a hidden template
pub const ULTIMATE_PERFORMANCE: &str = "Ultimate Performance";
/// Name of the plan restored when another plan is disabled
pub const BALANCED: &str = "Balanced";

/// Template GUID `powercfg /duplicatescheme` copies Ultimate Performance from
pub const ULTIMATE_PERFORMANCE_TEMPLATE: Uuid = Uuid::from_u128(0xe9a42b02_d5df_448d_aa00_03f14749eb61);

/// One power scheme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerPlan {
    pub name: String,
    pub guid: Uuid,
    /// True while `guid` still points at a template that must be
    /// duplicated before it can be activated
    #[serde(default)]
    pub from_template: bool,
}

impl PowerPlan {
    pub fn new(name: impl Into<String>, guid: Uuid) -> Self {
        Self {
            name: name.into(),
            guid,
            from_template: false,
        }
    }
}

/// Known power plans, owned by the power component
///
/// Plan GUIDs can change at runtime (a duplicated template gets a fresh
/// GUID); [`set_guid`](Self::set_guid) records that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerPlanCatalog {
    plans: Vec<PowerPlan>,
}

impl PowerPlanCatalog {
    pub fn new(plans: Vec<PowerPlan>) -> Self {
        Self { plans }
    }

    /// The plans shipped with Windows
    pub fn well_known() -> Self {
        Self::new(vec![
            PowerPlan::new(
                "Power saver",
                Uuid::from_u128(0xa1841308_3bcb_4da3_9216_a5fc91c28893),
            ),
            PowerPlan::new(
                BALANCED,
                Uuid::from_u128(0x381b4222_f694_41f0_9685_ff5bb260df2e),
            ),
            PowerPlan::new(
                "High performance",
                Uuid::from_u128(0x8c5e7fda_e8bf_4a96_9a85_a6e23a8c635c),
            ),
            PowerPlan {
                name: ULTIMATE_PERFORMANCE.to_string(),
                guid: ULTIMATE_PERFORMANCE_TEMPLATE,
                from_template: true,
            },
        ])
    }

    pub fn plans(&self) -> &[PowerPlan] {
        &self.plans
    }

    /// Case-insensitive lookup by name
    pub fn get(&self, name: &str) -> Option<&PowerPlan> {
        self.plans.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn by_guid(&self, guid: &Uuid) -> Option<&PowerPlan> {
        self.plans.iter().find(|p| &p.guid == guid)
    }

    /// Add `plan`, replacing a plan of the same name
    pub fn insert(&mut self, plan: PowerPlan) {
        match self.plans.iter_mut().find(|p| p.name.eq_ignore_ascii_case(&plan.name)) {
            Some(existing) => *existing = plan,
            None => self.plans.push(plan),
        }
    }

    /// Point `name` at a new GUID, clearing its template flag.
    ///
    /// Returns false when no plan has that name.
    pub fn set_guid(&mut self, name: &str, guid: Uuid) -> bool {
        match self.plans.iter_mut().find(|p| p.name.eq_ignore_ascii_case(name)) {
            Some(plan) => {
                plan.guid = guid;
                plan.from_template = false;
                true
            }
            None => false,
        }
    }
}

impl Default for PowerPlanCatalog {
    fn default() -> Self {
        Self::well_known()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_lookup() {
        let catalog = PowerPlanCatalog::well_known();
        assert_eq!(catalog.plans().len(), 4);
        assert_eq!(
            catalog.get("balanced").unwrap().guid.to_string(),
            "381b4222-f694-41f0-9685-ff5bb260df2e"
        );
        assert!(catalog.get(ULTIMATE_PERFORMANCE).unwrap().from_template);
        assert!(catalog.get("Turbo").is_none());
    }

    #[test]
    fn test_insert_replaces_by_name() {
        let mut catalog = PowerPlanCatalog::well_known();
        catalog.insert(PowerPlan::new("balanced", Uuid::from_u128(7)));
        catalog.insert(PowerPlan::new("Gaming", Uuid::from_u128(8)));

        assert_eq!(catalog.plans().len(), 5);
        assert_eq!(catalog.get(BALANCED).unwrap().guid, Uuid::from_u128(7));
        assert_eq!(catalog.by_guid(&Uuid::from_u128(8)).unwrap().name, "Gaming");
    }

    #[test]
    fn test_set_guid_updates_entry() {
        let mut catalog = PowerPlanCatalog::well_known();
        let fresh = Uuid::from_u128(0x1234);
        assert!(catalog.set_guid("ultimate performance", fresh));

        let plan = catalog.get(ULTIMATE_PERFORMANCE).unwrap();
        assert_eq!(plan.guid, fresh);
        assert!(!plan.from_template);
        assert_eq!(catalog.by_guid(&fresh).unwrap().name, ULTIMATE_PERFORMANCE);
        assert!(!catalog.set_guid("Turbo", fresh));
    }
}
