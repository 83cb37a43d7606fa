/// An amount of money in minor units.
pub struct Money {
    pub amount: i64,
    pub currency: String,
}
