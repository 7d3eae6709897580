use ahash::AHashMap;

/// `EnumType` descriptor (§3.2): declared names in order plus the
/// name→ordinal map. `for-in` over a type value sweeps every ordinal
/// between `low()` and `high()` inclusive (§9's resolved open question),
/// not just the declared names, so gaps between declared ordinals still
/// get visited.
#[derive(Debug)]
pub struct EnumType {
    pub name: String,
    pub ordered_names: Vec<String>,
    pub values: AHashMap<String, i64>,
}

impl EnumType {
    pub fn new(name: String, declared: &[(String, Option<i64>)]) -> Self {
        let mut ordered_names = Vec::with_capacity(declared.len());
        let mut values = AHashMap::default();
        let mut next = 0i64;
        for (ident, explicit) in declared {
            let ordinal = explicit.unwrap_or(next);
            ordered_names.push(ident.clone());
            values.insert(ident.to_lowercase(), ordinal);
            next = ordinal + 1;
        }
        Self {
            name,
            ordered_names,
            values,
        }
    }

    pub fn ordinal_of(&self, name: &str) -> Option<i64> {
        self.values.get(&name.to_lowercase()).copied()
    }

    /// Name registered for `ordinal`, if any value was declared with it
    /// exactly; ordinals swept between declared endpoints but never
    /// assigned a name (gaps) have no `.Name`.
    pub fn name_for(&self, ordinal: i64) -> Option<&str> {
        self.ordered_names
            .iter()
            .find(|n| self.values.get(&n.to_lowercase()) == Some(&ordinal))
            .map(String::as_str)
    }

    pub fn low(&self) -> i64 {
        self.values.values().copied().min().unwrap_or(0)
    }

    pub fn high(&self) -> i64 {
        self.values.values().copied().max().unwrap_or(0)
    }
}
