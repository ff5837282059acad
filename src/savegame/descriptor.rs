//! Declarative field layouts.
//!
//! A [`Layout`] is an ordered list of [`FieldDesc`] entries bound to accessor
//! functions of one record type. The same list drives both directions, so a
//! record is always written and read back in the identical order and width.
//! All scalars are little-endian on disk.

use std::io::{self, Read, Write};

use super::Tag;
use crate::context::SaveContext;
use crate::error::SaveError;

/// On-disk or in-memory scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
}

impl Scalar {
    pub const fn width(self) -> usize {
        match self {
            Scalar::U8 | Scalar::I8 => 1,
            Scalar::U16 | Scalar::I16 => 2,
            Scalar::U32 | Scalar::I32 => 4,
        }
    }

    /// Truncate `value` to this type and widen it back to 32 bits,
    /// sign-extending signed types.
    pub fn fit(self, value: u32) -> u32 {
        match self {
            Scalar::U8 => value & 0xFF,
            Scalar::I8 => value as u8 as i8 as i32 as u32,
            Scalar::U16 => value & 0xFFFF,
            Scalar::I16 => value as u16 as i16 as i32 as u32,
            Scalar::U32 | Scalar::I32 => value,
        }
    }

    fn read(self, r: &mut dyn Read) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        r.read_exact(&mut buf[..self.width()])?;
        Ok(self.fit(u32::from_le_bytes(buf)))
    }

    fn write(self, w: &mut dyn Write, value: u32) -> io::Result<()> {
        w.write_all(&value.to_le_bytes()[..self.width()])
    }
}

pub type Getter<T> = fn(&T) -> u32;
pub type Setter<T> = fn(&mut T, u32);
pub type IndexGetter<T> = fn(&T, usize) -> u32;
pub type IndexSetter<T> = fn(&mut T, usize, u32);
pub type SaveCallback<T> = fn(&T, &SaveContext) -> u32;
pub type LoadCallback<T> = fn(&mut T, u32, &SaveContext);

/// One entry of a [`Layout`].
pub enum FieldDesc<T> {
    /// Reserved bytes: zeros on save, skipped on load.
    Empty { ty: Scalar, count: usize },
    Entry {
        ty: Scalar,
        get: Getter<T>,
        set: Setter<T>,
    },
    /// Stored as `disk`, handed to the accessors as `logical`.
    Entry2 {
        disk: Scalar,
        logical: Scalar,
        get: Getter<T>,
        set: Setter<T>,
    },
    Array {
        ty: Scalar,
        count: usize,
        get: IndexGetter<T>,
        set: IndexSetter<T>,
    },
    /// Derived value: computed from the record on save, applied to it on
    /// load. References, clock deltas and deferred state go through here.
    Callback {
        ty: Scalar,
        save: SaveCallback<T>,
        load: LoadCallback<T>,
    },
    Nested(Box<dyn SubRecord<T>>),
    /// Stops interpretation; later entries are ignored.
    End,
}

/// A layout applied to a part of the enclosing record.
pub trait SubRecord<T> {
    fn length(&self) -> usize;
    fn load(&self, r: &mut dyn Read, target: &mut T, ctx: &SaveContext) -> io::Result<()>;
    fn save(&self, w: &mut dyn Write, target: &T, ctx: &SaveContext) -> io::Result<()>;
}

struct Nest<T, U> {
    layout: Layout<U>,
    get: fn(&T) -> &U,
    get_mut: fn(&mut T) -> &mut U,
}

impl<T, U> SubRecord<T> for Nest<T, U> {
    fn length(&self) -> usize {
        self.layout.length()
    }

    fn load(&self, r: &mut dyn Read, target: &mut T, ctx: &SaveContext) -> io::Result<()> {
        self.layout.load(r, (self.get_mut)(target), ctx)
    }

    fn save(&self, w: &mut dyn Write, target: &T, ctx: &SaveContext) -> io::Result<()> {
        self.layout.save(w, (self.get)(target), ctx)
    }
}

/// Ordered field list for records of type `T`.
pub struct Layout<T> {
    fields: Vec<FieldDesc<T>>,
}

impl<T> Default for Layout<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Layout<T> {
    pub fn new() -> Self {
        Layout { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[FieldDesc<T>] {
        &self.fields
    }

    pub fn push(mut self, field: FieldDesc<T>) -> Self {
        self.fields.push(field);
        self
    }

    pub fn empty(self, ty: Scalar, count: usize) -> Self {
        self.push(FieldDesc::Empty { ty, count })
    }

    pub fn entry(self, ty: Scalar, get: Getter<T>, set: Setter<T>) -> Self {
        self.push(FieldDesc::Entry { ty, get, set })
    }

    pub fn entry2(self, disk: Scalar, logical: Scalar, get: Getter<T>, set: Setter<T>) -> Self {
        self.push(FieldDesc::Entry2 {
            disk,
            logical,
            get,
            set,
        })
    }

    pub fn array(self, ty: Scalar, count: usize, get: IndexGetter<T>, set: IndexSetter<T>) -> Self {
        self.push(FieldDesc::Array { ty, count, get, set })
    }

    pub fn callback(self, ty: Scalar, save: SaveCallback<T>, load: LoadCallback<T>) -> Self {
        self.push(FieldDesc::Callback { ty, save, load })
    }

    pub fn nested<U: 'static>(
        self,
        layout: Layout<U>,
        get: fn(&T) -> &U,
        get_mut: fn(&mut T) -> &mut U,
    ) -> Self
    where
        T: 'static,
    {
        self.push(FieldDesc::Nested(Box::new(Nest {
            layout,
            get,
            get_mut,
        })))
    }

    pub fn end(self) -> Self {
        self.push(FieldDesc::End)
    }

    /// Bytes one record occupies on disk.
    pub fn length(&self) -> usize {
        let mut total = 0;
        for field in &self.fields {
            total += match field {
                FieldDesc::Empty { ty, count } | FieldDesc::Array { ty, count, .. } => {
                    ty.width() * count
                }
                FieldDesc::Entry { ty, .. } | FieldDesc::Callback { ty, .. } => ty.width(),
                FieldDesc::Entry2 { disk, .. } => disk.width(),
                FieldDesc::Nested(sub) => sub.length(),
                FieldDesc::End => break,
            };
        }
        total
    }

    /// Require that a chunk holds exactly one record.
    pub fn check_length(&self, tag: Tag, declared: u32) -> Result<(), SaveError> {
        let expected = self.length();
        if expected != declared as usize {
            return Err(SaveError::LengthMismatch {
                tag,
                expected,
                found: declared,
            });
        }
        Ok(())
    }

    pub fn load(&self, r: &mut dyn Read, target: &mut T, ctx: &SaveContext) -> io::Result<()> {
        for field in &self.fields {
            match field {
                FieldDesc::Empty { ty, count } => {
                    let len = (ty.width() * count) as u64;
                    let skipped = io::copy(&mut (&mut *r).take(len), &mut io::sink())?;
                    if skipped != len {
                        return Err(io::ErrorKind::UnexpectedEof.into());
                    }
                }
                FieldDesc::Entry { ty, set, .. } => {
                    let value = ty.read(r)?;
                    set(target, value);
                }
                FieldDesc::Entry2 { disk, logical, set, .. } => {
                    let value = disk.read(r)?;
                    set(target, logical.fit(value));
                }
                FieldDesc::Array { ty, count, set, .. } => {
                    for i in 0..*count {
                        let value = ty.read(r)?;
                        set(target, i, value);
                    }
                }
                FieldDesc::Callback { ty, load, .. } => {
                    let raw = ty.read(r)?;
                    load(target, raw, ctx);
                }
                FieldDesc::Nested(sub) => sub.load(r, target, ctx)?,
                FieldDesc::End => break,
            }
        }
        Ok(())
    }

    pub fn save(&self, w: &mut dyn Write, target: &T, ctx: &SaveContext) -> io::Result<()> {
        for field in &self.fields {
            match field {
                FieldDesc::Empty { ty, count } => {
                    let len = (ty.width() * count) as u64;
                    io::copy(&mut io::repeat(0).take(len), w)?;
                }
                FieldDesc::Entry { ty, get, .. } => ty.write(w, get(target))?,
                FieldDesc::Entry2 { disk, get, .. } => disk.write(w, get(target))?,
                FieldDesc::Array { ty, count, get, .. } => {
                    for i in 0..*count {
                        ty.write(w, get(target, i))?;
                    }
                }
                FieldDesc::Callback { ty, save, .. } => ty.write(w, save(target, ctx))?,
                FieldDesc::Nested(sub) => sub.save(w, target, ctx)?,
                FieldDesc::End => break,
            }
        }
        Ok(())
    }
}
