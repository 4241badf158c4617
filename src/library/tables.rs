use redb::TableDefinition;

/// Book records: uuid -> BookRecord (msgpack)
pub const BOOKS: TableDefinition<&str, &[u8]> = TableDefinition::new("books");
