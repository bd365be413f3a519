//! Exported signal table.
//!
//! Every value a module exchanges with the hosting runtime is a named
//! signal: a single 64-bit atomic cell holding a bit, float, signed or
//! unsigned value. Handles are cheap to clone and may be read or written
//! from any thread with relaxed ordering; each signal has one writer.
//!
//! Function names (`<prefix>.update`, `<prefix>.capture-position`) live in
//! the same namespace.

use crate::error::SignalError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Value type of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    /// Boolean.
    Bit,
    /// 64-bit float.
    Float,
    /// Signed 32-bit.
    S32,
    /// Unsigned 32-bit.
    U32,
}

impl SignalType {
    /// Type name as shown in listings.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bit => "bit",
            Self::Float => "float",
            Self::S32 => "s32",
            Self::U32 => "u32",
        }
    }

    fn to_json(self, bits: u64) -> Value {
        match self {
            Self::Bit => Value::from(bits != 0),
            Self::Float => Value::from(f64::from_bits(bits)),
            Self::S32 => Value::from(bits as u32 as i32),
            Self::U32 => Value::from(bits as u32),
        }
    }
}

/// Data direction seen from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDir {
    /// Written by the runtime, read by the driver.
    In,
    /// Written by the driver, read by the runtime.
    Out,
    /// Parameter, writable by the runtime.
    Rw,
    /// Parameter, informational only.
    Ro,
}

/// Rust type storable in a signal cell.
pub trait SignalValue: Copy + Send + Sync + 'static {
    /// Signal type tag.
    const TYPE: SignalType;
    /// Encode to the cell representation.
    fn to_bits(self) -> u64;
    /// Decode from the cell representation.
    fn from_bits(bits: u64) -> Self;
}

impl SignalValue for bool {
    const TYPE: SignalType = SignalType::Bit;
    fn to_bits(self) -> u64 {
        self as u64
    }
    fn from_bits(bits: u64) -> Self {
        bits != 0
    }
}

impl SignalValue for f64 {
    const TYPE: SignalType = SignalType::Float;
    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }
    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

impl SignalValue for i32 {
    const TYPE: SignalType = SignalType::S32;
    fn to_bits(self) -> u64 {
        self as u32 as u64
    }
    fn from_bits(bits: u64) -> Self {
        bits as u32 as i32
    }
}

impl SignalValue for u32 {
    const TYPE: SignalType = SignalType::U32;
    fn to_bits(self) -> u64 {
        self as u64
    }
    fn from_bits(bits: u64) -> Self {
        bits as u32
    }
}

/// Typed handle to one signal cell.
#[derive(Debug)]
pub struct Signal<T: SignalValue> {
    cell: Arc<AtomicU64>,
    _type: PhantomData<T>,
}

impl<T: SignalValue> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            _type: PhantomData,
        }
    }
}

impl<T: SignalValue> Signal<T> {
    /// Free-standing signal not registered in any table.
    pub fn detached(initial: T) -> Self {
        Self {
            cell: Arc::new(AtomicU64::new(initial.to_bits())),
            _type: PhantomData,
        }
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> T {
        T::from_bits(self.cell.load(Ordering::Relaxed))
    }

    /// Store a new value.
    #[inline]
    pub fn set(&self, value: T) {
        self.cell.store(value.to_bits(), Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct Entry {
    name: String,
    ty: SignalType,
    dir: SignalDir,
    cell: Arc<AtomicU64>,
}

/// Description of one exported signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalInfo {
    /// Full name.
    pub name: String,
    /// Value type.
    pub ty: SignalType,
    /// Direction.
    pub dir: SignalDir,
}

/// Registry of exported signals and functions.
#[derive(Debug, Default)]
pub struct SignalTable {
    entries: Vec<Entry>,
    functions: Vec<String>,
    index: HashMap<String, usize>,
}

impl SignalTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn reserve_name(&self, name: &str) -> Result<(), SignalError> {
        if self.index.contains_key(name) || self.functions.iter().any(|f| f == name) {
            return Err(SignalError::Duplicate(name.to_string()));
        }
        Ok(())
    }

    /// Export a signal and return its handle.
    ///
    /// # Errors
    /// `Duplicate` when the name is already taken.
    pub fn export<T: SignalValue>(
        &mut self,
        name: impl Into<String>,
        dir: SignalDir,
        initial: T,
    ) -> Result<Signal<T>, SignalError> {
        let name = name.into();
        self.reserve_name(&name)?;
        let signal = Signal::detached(initial);
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(Entry {
            name,
            ty: T::TYPE,
            dir,
            cell: Arc::clone(&signal.cell),
        });
        Ok(signal)
    }

    /// Export a function name.
    ///
    /// # Errors
    /// `Duplicate` when the name is already taken.
    pub fn export_function(&mut self, name: impl Into<String>) -> Result<(), SignalError> {
        let name = name.into();
        self.reserve_name(&name)?;
        self.functions.push(name);
        Ok(())
    }

    /// Look up a signal by name.
    ///
    /// # Errors
    /// `Unknown` for a missing name, `TypeMismatch` for a wrong `T`.
    pub fn get<T: SignalValue>(&self, name: &str) -> Result<Signal<T>, SignalError> {
        let entry = self
            .index
            .get(name)
            .map(|i| &self.entries[*i])
            .ok_or_else(|| SignalError::Unknown(name.to_string()))?;
        if entry.ty != T::TYPE {
            return Err(SignalError::TypeMismatch {
                name: name.to_string(),
                actual: entry.ty.name(),
                requested: T::TYPE.name(),
            });
        }
        Ok(Signal {
            cell: Arc::clone(&entry.cell),
            _type: PhantomData,
        })
    }

    /// True when `name` is an exported signal or function.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name) || self.functions.iter().any(|f| f == name)
    }

    /// Exported signals in export order.
    pub fn signals(&self) -> impl Iterator<Item = SignalInfo> + '_ {
        self.entries.iter().map(|e| SignalInfo {
            name: e.name.clone(),
            ty: e.ty,
            dir: e.dir,
        })
    }

    /// Exported function names in export order.
    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    /// Number of exported signals.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is exported.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.functions.is_empty()
    }

    /// All signal values as a JSON object keyed by name.
    pub fn snapshot(&self) -> Value {
        let mut map = Map::new();
        for e in &self.entries {
            map.insert(e.name.clone(), e.ty.to_json(e.cell.load(Ordering::Relaxed)));
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_and_share() {
        let mut table = SignalTable::new();
        let out = table.export("hpg.x", SignalDir::Out, 1.5f64).unwrap();
        let seen: Signal<f64> = table.get("hpg.x").unwrap();
        assert_eq!(seen.get(), 1.5);
        out.set(-2.0);
        assert_eq!(seen.get(), -2.0);
    }

    #[test]
    fn value_encodings() {
        let s = Signal::detached(-5i32);
        assert_eq!(s.get(), -5);
        let b = Signal::detached(true);
        assert!(b.get());
        let u = Signal::detached(u32::MAX);
        assert_eq!(u.get(), u32::MAX);
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut table = SignalTable::new();
        table.export("hpg.a", SignalDir::In, false).unwrap();
        assert_eq!(
            table.export("hpg.a", SignalDir::In, 0u32).unwrap_err(),
            SignalError::Duplicate("hpg.a".to_string())
        );
        table.export_function("hpg.update").unwrap();
        assert!(table.export("hpg.update", SignalDir::In, false).is_err());
        assert!(table.export_function("hpg.a").is_err());
    }

    #[test]
    fn lookup_errors() {
        let mut table = SignalTable::new();
        table.export("hpg.n", SignalDir::Out, 0i32).unwrap();
        assert!(matches!(
            table.get::<i32>("hpg.m"),
            Err(SignalError::Unknown(_))
        ));
        assert!(matches!(
            table.get::<f64>("hpg.n"),
            Err(SignalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn snapshot_is_typed() {
        let mut table = SignalTable::new();
        table.export("hpg.bit", SignalDir::Out, true).unwrap();
        table.export("hpg.s32", SignalDir::Out, -3i32).unwrap();
        let snap = table.snapshot();
        assert_eq!(snap["hpg.bit"], Value::from(true));
        assert_eq!(snap["hpg.s32"], Value::from(-3));
    }
}
