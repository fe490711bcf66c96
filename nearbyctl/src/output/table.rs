use tabled::{Table, settings::Style};

/// Consistent styling for every table printed by nearbyctl
pub(crate) trait NearbyctlTable {
    fn styled(&mut self) -> &mut Self;
}

impl NearbyctlTable for Table {
    fn styled(&mut self) -> &mut Self {
        self.with(Style::rounded())
    }
}
