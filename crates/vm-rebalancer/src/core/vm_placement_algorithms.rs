pub mod first_fit;
pub mod min_power_increase;
