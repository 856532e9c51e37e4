/// One item absorbed into a sketch: an integer, a float, or a byte string,
/// each hashed its own way so two nodes agree on which register an item
/// lands in regardless of which variant carried it.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Int(v)
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Datum::Float(v)
    }
}

impl From<Vec<u8>> for Datum {
    fn from(v: Vec<u8>) -> Self {
        Datum::Bytes(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::Bytes(v.as_bytes().to_vec())
    }
}

impl From<String> for Datum {
    fn from(v: String) -> Self {
        Datum::Bytes(v.into_bytes())
    }
}
