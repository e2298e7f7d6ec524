use crate::schema::DataType;
use std::fmt::Debug;

/// A fixed-width value stored little-endian in a values buffer.
pub trait NativeType: Copy + Debug + PartialEq + 'static {
    const DATA_TYPE: DataType;
    const WIDTH: usize;

    fn extend_le<E: Extend<u8>>(self, out: &mut E);

    /// `bytes` is exactly `WIDTH` long.
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! native_type {
    ($t:ty, $data_type:expr) => {
        impl NativeType for $t {
            const DATA_TYPE: DataType = $data_type;
            const WIDTH: usize = std::mem::size_of::<$t>();

            fn extend_le<E: Extend<u8>>(self, out: &mut E) {
                out.extend(self.to_le_bytes());
            }

            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut raw = [0; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_le_bytes(raw)
            }
        }
    };
}

native_type!(i8, DataType::Int8);
native_type!(i16, DataType::Int16);
native_type!(i32, DataType::Int32);
native_type!(i64, DataType::Int64);
native_type!(u8, DataType::UInt8);
native_type!(u16, DataType::UInt16);
native_type!(u32, DataType::UInt32);
native_type!(u64, DataType::UInt64);
native_type!(f32, DataType::Float32);
native_type!(f64, DataType::Float64);
