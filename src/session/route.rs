use serde::{Deserialize, Serialize};

/// Mapping of a logical name onto a physical one
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteMapper {
    pub logic_name: String,
    pub actual_name: String,
}

impl RouteMapper {
    pub fn new(logic_name: impl Into<String>, actual_name: impl Into<String>) -> Self {
        Self {
            logic_name: logic_name.into(),
            actual_name: actual_name.into(),
        }
    }
}

/// One physical data source touched by a routed statement, with its table mappings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteUnit {
    pub data_source_mapper: RouteMapper,
    pub table_mappers: Vec<RouteMapper>,
}

impl RouteUnit {
    pub fn new(data_source_mapper: RouteMapper, table_mappers: Vec<RouteMapper>) -> Self {
        Self {
            data_source_mapper,
            table_mappers,
        }
    }

    pub fn actual_data_source(&self) -> &str {
        &self.data_source_mapper.actual_name
    }

    pub fn logic_table_names(&self) -> impl Iterator<Item = &str> {
        self.table_mappers.iter().map(|m| m.logic_name.as_str())
    }

    pub fn find_table_mapper(&self, logic_table: &str) -> Option<&RouteMapper> {
        self.table_mappers
            .iter()
            .find(|m| m.logic_name.eq_ignore_ascii_case(logic_table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_table_mapper_is_case_insensitive() {
        let unit = RouteUnit::new(
            RouteMapper::new("logic_db", "ds_1"),
            vec![RouteMapper::new("t_order", "t_order_1")],
        );
        assert_eq!(unit.actual_data_source(), "ds_1");
        assert_eq!(
            unit.find_table_mapper("T_ORDER").map(|m| m.actual_name.as_str()),
            Some("t_order_1")
        );
        assert_eq!(unit.logic_table_names().collect::<Vec<_>>(), vec!["t_order"]);
    }
}
