use async_graphql::ID;

use crate::gql::error::ResultExt;

/// Parse a numeric entity id from a GraphQL `ID`.
pub fn parse_id(id: &ID, what: &str) -> async_graphql::Result<i64> {
    id.as_str()
        .trim()
        .parse::<i64>()
        .gql_err(&format!("Invalid {what} ID"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_ids() {
        assert_eq!(parse_id(&ID::from("42"), "booking").unwrap(), 42);
        let err = parse_id(&ID::from("abc"), "booking").unwrap_err();
        assert!(err.message.starts_with("Invalid booking ID"));
    }
}
