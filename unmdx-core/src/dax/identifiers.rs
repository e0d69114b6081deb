//! DAX identifier and literal escaping (`spec.md` §4.5).

const RESERVED_TABLE_NAMES: &[&str] = &["Date", "Time", "Value", "Min", "Max", "Sum", "Count", "Average"];

/// `'Table Name'` when the name contains whitespace or collides with a
/// reserved word DAX treats specially; bare `Table` otherwise.
pub fn escape_table(name: &str) -> String {
    if name.chars().any(char::is_whitespace) || RESERVED_TABLE_NAMES.contains(&name) {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.to_string()
    }
}

/// `Table[Column]`, escaping the table half per [`escape_table`].
pub fn escape_column(table: &str, column: &str) -> String {
    format!("{}[{}]", escape_table(table), column)
}

/// A double-quoted DAX string literal, doubling embedded quotes.
pub fn quote_string_literal(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_table_name_is_unquoted() {
        assert_eq!(escape_table("Product"), "Product");
    }

    #[test]
    fn table_name_with_space_is_quoted() {
        assert_eq!(escape_table("Sales Territory"), "'Sales Territory'");
    }

    #[test]
    fn reserved_table_name_is_quoted() {
        assert_eq!(escape_table("Date"), "'Date'");
    }

    #[test]
    fn embedded_quote_is_doubled() {
        assert_eq!(quote_string_literal("O'Brien"), "\"O'Brien\"");
        assert_eq!(quote_string_literal("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
