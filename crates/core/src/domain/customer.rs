use serde::{Deserialize, Serialize};

use crate::domain::principal::ShopId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub shop_id: ShopId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub shop_id: ShopId,
    pub customer_id: CustomerId,
    pub year: Option<i64>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub trim: Option<String>,
}

impl Vehicle {
    /// Display summary like "2018 Toyota Camry SE"; falls back when nothing
    /// about the vehicle was recorded at intake.
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(year) = self.year {
            parts.push(year.to_string());
        }
        for field in [&self.make, &self.model, &self.trim] {
            if let Some(value) = field {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
        }
        if parts.is_empty() {
            return "Vehicle on file".to_string();
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::{CustomerId, Vehicle, VehicleId};
    use crate::domain::principal::ShopId;

    fn vehicle(year: Option<i64>, make: Option<&str>, model: Option<&str>) -> Vehicle {
        Vehicle {
            id: VehicleId("veh-1".to_string()),
            shop_id: ShopId("shop-1".to_string()),
            customer_id: CustomerId("cust-1".to_string()),
            year,
            make: make.map(str::to_string),
            model: model.map(str::to_string),
            trim: None,
        }
    }

    #[test]
    fn summary_joins_known_fields() {
        assert_eq!(vehicle(Some(2018), Some("Toyota"), Some("Camry")).summary(), "2018 Toyota Camry");
    }

    #[test]
    fn summary_has_fallback_for_empty_vehicle() {
        assert_eq!(vehicle(None, None, None).summary(), "Vehicle on file");
    }
}
