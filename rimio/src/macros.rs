// SPDX-License-Identifier: MIT

/// Implements big-endian read/write functions for primitive types on RimIO.
///
/// On-disk formats probed through RimIO (XDR nvlists, GPT CRC fields aside)
/// are big-endian, so `read_u32_be_at` and friends are generated here.
#[macro_export]
macro_rules! RimIO_impl_primitive_be_rw {
    ($($ty:ty),+ $(,)?) => {
        $(
            paste::paste! {
                #[inline(always)]
                fn [<write_ $ty _be_at>](&mut self, offset: u64, value: $ty) -> RimIOResult {
                    let buf = value.to_be_bytes();
                    self.write_at(offset, &buf)
                }

                #[inline(always)]
                fn [<read_ $ty _be_at>](&mut self, offset: u64) -> RimIOResult<$ty> {
                    let mut buf = [0u8; core::mem::size_of::<$ty>()];
                    self.read_at(offset, &mut buf)?;
                    Ok(<$ty>::from_be_bytes(buf))
                }
            }
        )+
    };
}
