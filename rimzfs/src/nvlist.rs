// SPDX-License-Identifier: MIT
//! XDR nvlist decoding, restricted to what label identification needs.
//!
//! Pair layout (all words big-endian):
//!
//! ```text
//! +0   encoded size     (0 closes the current list)
//! +4   decoded size
//! +8   name length
//! +12  name, padded to 4 bytes
//! +..  value: type, element count, data
//! ```
//!
//! Embedded lists are not length-prefixed: a directory pair is followed by the
//! pairs of the nested list and an 8-byte terminator. The walker follows them
//! with a depth counter instead of recursing.

use alloc::string::String;

use crate::{constant::*, errors::*, pool::LabelVitals};

#[inline]
fn be32(buf: &[u8], at: usize) -> Option<u32> {
    let end = at.checked_add(4)?;
    let bytes = buf.get(at..end)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
fn be64(buf: &[u8], at: usize) -> Option<u64> {
    let hi = be32(buf, at)? as u64;
    let lo = be32(buf, at.checked_add(4)?)? as u64;
    Some((hi << 32) | lo)
}

/// Leading type tag of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvTag {
    Unknown,
    UInt64,
    String,
    Directory,
    /// Any type identification does not look at.
    Other(u32),
}

impl NvTag {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            DATA_TYPE_UNKNOWN => NvTag::Unknown,
            DATA_TYPE_UINT64 => NvTag::UInt64,
            DATA_TYPE_STRING => NvTag::String,
            DATA_TYPE_NVLIST => NvTag::Directory,
            other => NvTag::Other(other),
        }
    }
}

/// Decoded value of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvValue<'a> {
    UInt64(u64),
    /// Raw string bytes, without the XDR padding.
    String(&'a [u8]),
    Directory,
    Other(u32),
}

/// A pair borrowed from the window.
#[derive(Debug, Clone, Copy)]
pub struct NvPair<'a> {
    /// Name bytes as stored (`namelen` bytes, padding excluded)
    pub name: &'a [u8],
    /// Nesting level the pair was found at (0 = label root)
    pub depth: u32,
    pub tag: NvTag,
    /// Value bytes from the type tag to the end of the pair
    raw: &'a [u8],
}

impl<'a> NvPair<'a> {
    /// Exact name comparison, ignoring trailing NUL bytes.
    pub fn is(&self, key: &[u8]) -> bool {
        let mut name = self.name;
        while let [head @ .., 0] = name {
            name = head;
        }
        name == key
    }

    /// Decodes the value. Fails when it does not fit inside the pair.
    pub fn value(&self) -> ZfsResult<NvValue<'a>> {
        match self.tag {
            NvTag::UInt64 => be64(self.raw, 8)
                .map(NvValue::UInt64)
                .ok_or(ZfsError::Malformed("nvlist: truncated uint64")),
            NvTag::String => {
                let len = be32(self.raw, 8)
                    .ok_or(ZfsError::Malformed("nvlist: truncated string"))?
                    as usize;
                let end = NV_STRING_PREFIX_SIZE
                    .checked_add(len)
                    .ok_or(ZfsError::Malformed("nvlist: string length overflow"))?;
                self.raw
                    .get(NV_STRING_PREFIX_SIZE..end)
                    .map(NvValue::String)
                    .ok_or(ZfsError::Malformed("nvlist: truncated string"))
            }
            NvTag::Directory => Ok(NvValue::Directory),
            NvTag::Other(t) => Ok(NvValue::Other(t)),
            NvTag::Unknown => Err(ZfsError::Malformed("nvlist: unknown data type")),
        }
    }

    pub fn as_u64(&self) -> ZfsResult<u64> {
        match self.value()? {
            NvValue::UInt64(v) => Ok(v),
            _ => Err(ZfsError::Malformed("nvlist: expected uint64")),
        }
    }

    pub fn as_bytes_str(&self) -> ZfsResult<&'a [u8]> {
        match self.value()? {
            NvValue::String(s) => Ok(s),
            _ => Err(ZfsError::Malformed("nvlist: expected string")),
        }
    }
}

/// Flat walker over the pair stream of one label window.
///
/// Every step consumes at least 8 bytes of a bounded window, so a crafted
/// stream can neither loop forever nor nest deeper than the stack allows.
pub struct NvWalker<'a> {
    buf: &'a [u8],
    pos: usize,
    left: usize,
    depth: u32,
    done: bool,
}

impl<'a> NvWalker<'a> {
    /// Starts right after the 12-byte preamble of `window`.
    pub fn new(window: &'a [u8]) -> Self {
        Self {
            buf: window,
            pos: NVLIST_PREAMBLE_SIZE,
            left: window.len().saturating_sub(NVLIST_PREAMBLE_SIZE),
            depth: 0,
            done: false,
        }
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Offset of the next pair inside the window.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    fn advance(&mut self, n: usize) -> ZfsResult<()> {
        if n > self.left {
            return Err(ZfsError::Malformed("nvlist: pair overruns window"));
        }
        self.pos += n;
        self.left -= n;
        Ok(())
    }

    /// Next pair, `Ok(None)` at the end of the root list (or of the window).
    ///
    /// Any error is final for this label: the stream cannot be resynchronised.
    pub fn next_pair(&mut self) -> ZfsResult<Option<NvPair<'a>>> {
        while !self.done && self.left > NVPAIR_PREFIX_SIZE {
            let size = be32(self.buf, self.pos)
                .ok_or(ZfsError::Malformed("nvlist: truncated pair"))? as usize;
            let namelen = be32(self.buf, self.pos + 8)
                .ok_or(ZfsError::Malformed("nvlist: truncated pair"))? as usize;

            if size == 0 {
                if self.depth == 0 {
                    self.done = true;
                    break;
                }
                self.depth -= 1;
                self.advance(NVLIST_END_SIZE)?;
                continue;
            }

            let namesize = namelen
                .checked_add(3)
                .ok_or(ZfsError::Malformed("nvlist: name length overflow"))?
                & !3;
            if size > self.left {
                return Err(ZfsError::Malformed("nvlist: pair larger than window"));
            }
            let value_at = NVPAIR_PREFIX_SIZE
                .checked_add(namesize)
                .filter(|&v| v <= size)
                .ok_or(ZfsError::Malformed("nvlist: name overruns pair"))?;

            let pair_buf = &self.buf[self.pos..self.pos + size];
            let name = &pair_buf[NVPAIR_PREFIX_SIZE..NVPAIR_PREFIX_SIZE + namelen];
            let raw_tag = be32(pair_buf, value_at)
                .ok_or(ZfsError::Malformed("nvlist: truncated value"))?;
            let tag = NvTag::from_raw(raw_tag);
            let depth = self.depth;

            log::trace!(
                "nvpair @{:#x} depth={} size={} tag={:?}",
                self.pos,
                depth,
                size,
                tag
            );

            let consumed = match tag {
                NvTag::Unknown => {
                    return Err(ZfsError::Malformed("nvlist: unknown data type"));
                }
                // The nested pairs follow the directory marker, so only the
                // marker belongs to this pair.
                NvTag::Directory => {
                    let marker_end = value_at + NV_DIRECTORY_SIZE;
                    if marker_end > self.left {
                        return Err(ZfsError::Malformed("nvlist: truncated directory"));
                    }
                    self.depth += 1;
                    marker_end
                }
                _ => size,
            };
            let raw = &self.buf[self.pos + value_at..self.pos + consumed];

            self.advance(consumed)?;
            return Ok(Some(NvPair {
                name,
                depth,
                tag,
                raw,
            }));
        }
        Ok(None)
    }
}

/// Existence pass: collects `guid`, `state` and `txg` from the label root.
///
/// Later duplicates overwrite earlier ones. A mistyped or truncated value for
/// one of these keys fails the label.
pub fn scan_vitals(window: &[u8]) -> ZfsResult<LabelVitals> {
    let mut walker = NvWalker::new(window);
    let mut vitals = LabelVitals::default();

    while let Some(pair) = walker.next_pair()? {
        if pair.depth != 0 {
            continue;
        }
        if pair.is(ZPOOL_CONFIG_GUID) {
            vitals.guid = pair.as_u64()?;
        } else if pair.is(ZPOOL_CONFIG_POOL_STATE) {
            vitals.state = Some(pair.as_u64()?);
        } else if pair.is(ZPOOL_CONFIG_POOL_TXG) {
            vitals.txg = pair.as_u64()?;
        }
    }
    Ok(vitals)
}

/// Identification fields surfaced by the full pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelInfo {
    pub pool_name: Option<String>,
    /// Device guid
    pub guid: Option<u64>,
    pub pool_guid: Option<u64>,
    pub ashift: Option<u64>,
    /// On-disk format version
    pub version: Option<u64>,
}

impl LabelInfo {
    /// Number of fields present.
    pub fn found(&self) -> usize {
        self.pool_name.is_some() as usize
            + self.guid.is_some() as usize
            + self.pool_guid.is_some() as usize
            + self.ashift.is_some() as usize
            + self.version.is_some() as usize
    }

    /// `1 << ashift`, only for shifts that fit 32 bits.
    pub fn block_size(&self) -> Option<u32> {
        self.ashift.filter(|&a| a < 32).map(|a| 1u32 << a)
    }
}

/// Full pass: the five identification fields.
///
/// Each field keeps its first occurrence. Stops at `max_found` distinct fields
/// (`None` walks the whole list), or at the first malformed field or stream
/// error; whatever was found until then is returned.
pub fn extract_label_info(window: &[u8], max_found: Option<usize>) -> LabelInfo {
    let mut info = LabelInfo::default();
    if let Err(e) = fill_label_info(window, max_found, &mut info) {
        log::debug!("nvlist: extraction stopped after {} fields: {}", info.found(), e);
    }
    info
}

fn fill_label_info(window: &[u8], max_found: Option<usize>, info: &mut LabelInfo) -> ZfsResult<()> {
    let mut walker = NvWalker::new(window);

    loop {
        if max_found.is_some_and(|max| info.found() >= max) {
            break;
        }
        let Some(pair) = walker.next_pair()? else {
            break;
        };
        let root = pair.depth == 0;

        if root && pair.is(ZPOOL_CONFIG_POOL_NAME) {
            if info.pool_name.is_none() {
                let name = pair.as_bytes_str()?;
                info.pool_name = Some(String::from_utf8_lossy(name).into_owned());
            }
        } else if root && pair.is(ZPOOL_CONFIG_GUID) {
            if info.guid.is_none() {
                info.guid = Some(pair.as_u64()?);
            }
        } else if root && pair.is(ZPOOL_CONFIG_POOL_GUID) {
            if info.pool_guid.is_none() {
                info.pool_guid = Some(pair.as_u64()?);
            }
        } else if root && pair.is(ZPOOL_CONFIG_VERSION) {
            if info.version.is_none() {
                info.version = Some(pair.as_u64()?);
            }
        } else if pair.is(ZPOOL_CONFIG_ASHIFT) && info.ashift.is_none() {
            info.ashift = Some(pair.as_u64()?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::testing::{NvListBuilder, label_window};

    fn walk(window: &[u8]) -> ZfsResult<Vec<(Vec<u8>, u32, NvTag)>> {
        let mut walker = NvWalker::new(window);
        let mut out = Vec::new();
        while let Some(p) = walker.next_pair()? {
            out.push((p.name.to_vec(), p.depth, p.tag));
        }
        Ok(out)
    }

    #[test]
    fn walks_nested_lists_flat() {
        let list = NvListBuilder::new()
            .uint64("version", 5000)
            .directory("vdev_tree", |d| {
                d.string("type", "disk")
                    .directory("inner", |d| d.uint64("id", 1))
                    .uint64("ashift", 12)
            })
            .uint64("guid", 42)
            .finish();
        let window = label_window(&list);

        let pairs = walk(&window).unwrap();
        let names: Vec<&[u8]> = pairs.iter().map(|(n, _, _)| n.as_slice()).collect();
        let depths: Vec<u32> = pairs.iter().map(|(_, d, _)| *d).collect();
        assert_eq!(
            names,
            [
                &b"version"[..],
                &b"vdev_tree"[..],
                &b"type"[..],
                &b"inner"[..],
                &b"id"[..],
                &b"ashift"[..],
                &b"guid"[..],
            ]
        );
        assert_eq!(depths, [0, 0, 1, 1, 2, 1, 0]);
        assert_eq!(pairs[1].2, NvTag::Directory);
    }

    #[test]
    fn vitals_from_root_only() {
        let list = NvListBuilder::new()
            .uint64("state", 0)
            .directory("vdev_tree", |d| d.uint64("guid", 99).uint64("txg", 7))
            .uint64("txg", 12)
            .uint64("guid", 1234)
            .finish();

        let vitals = scan_vitals(&label_window(&list)).unwrap();
        assert_eq!(vitals.guid, 1234);
        assert_eq!(vitals.state, Some(0));
        assert_eq!(vitals.txg, 12);
        assert!(vitals.is_genuine());
    }

    #[test]
    fn vitals_last_duplicate_wins() {
        let list = NvListBuilder::new()
            .uint64("txg", 5)
            .uint64("txg", 0)
            .uint64("guid", 1)
            .uint64("state", 0)
            .finish();
        let vitals = scan_vitals(&label_window(&list)).unwrap();
        assert_eq!(vitals.txg, 0);
        assert!(!vitals.is_genuine());
    }

    #[test]
    fn vitals_reject_mistyped_key() {
        let list = NvListBuilder::new().string("guid", "oops").finish();
        assert_eq!(
            scan_vitals(&label_window(&list)),
            Err(ZfsError::Malformed("nvlist: expected uint64"))
        );
    }

    #[test]
    fn other_types_are_skipped() {
        let list = NvListBuilder::new()
            .other("features", 22, &[0xFF; 12])
            .uint64("guid", 3)
            .uint64("state", 4)
            .finish();
        let vitals = scan_vitals(&label_window(&list)).unwrap();
        assert_eq!(vitals.guid, 3);
        assert!(vitals.is_genuine());
    }

    #[test]
    fn unknown_type_fails() {
        let list = NvListBuilder::new()
            .uint64("guid", 3)
            .other("bad", DATA_TYPE_UNKNOWN, &[0; 8])
            .finish();
        assert_eq!(
            scan_vitals(&label_window(&list)),
            Err(ZfsError::Malformed("nvlist: unknown data type"))
        );
    }

    #[test]
    fn name_longer_than_pair_fails() {
        // size 20, namelen 16: 12 + 16 > 20
        let mut raw = Vec::new();
        raw.extend_from_slice(&20u32.to_be_bytes());
        raw.extend_from_slice(&20u32.to_be_bytes());
        raw.extend_from_slice(&16u32.to_be_bytes());
        raw.extend_from_slice(&[b'a'; 16]);
        let list = NvListBuilder::new().raw(&raw).finish();
        assert_eq!(
            scan_vitals(&label_window(&list)),
            Err(ZfsError::Malformed("nvlist: name overruns pair"))
        );
    }

    #[test]
    fn pair_larger_than_window_fails() {
        let list = NvListBuilder::new().uint64("guid", 1).finish();
        let mut window = label_window(&list);
        window[12..16].copy_from_slice(&0x0010_0000u32.to_be_bytes());
        assert!(scan_vitals(&window).is_err());
    }

    #[test]
    fn huge_name_length_does_not_overflow() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&64u32.to_be_bytes());
        raw.extend_from_slice(&64u32.to_be_bytes());
        raw.extend_from_slice(&u32::MAX.to_be_bytes());
        raw.extend_from_slice(&[0; 52]);
        let list = NvListBuilder::new().raw(&raw).finish();
        assert!(scan_vitals(&label_window(&list)).is_err());
    }

    #[test]
    fn truncated_directory_marker_fails() {
        let list = NvListBuilder::new().uint64("guid", 1).finish();
        let mut window = label_window(&list);
        let end = window.len();
        // A directory pair whose marker would run past the window end.
        let at = end - 24;
        window[12..16].copy_from_slice(&((at - 12) as u32).to_be_bytes());
        window[at..at + 4].copy_from_slice(&24u32.to_be_bytes());
        window[at + 8..at + 12].copy_from_slice(&4u32.to_be_bytes());
        window[at + 12..at + 16].copy_from_slice(b"tree");
        window[at + 16..at + 20].copy_from_slice(&DATA_TYPE_NVLIST.to_be_bytes());
        assert_eq!(
            walk(&window).unwrap_err(),
            ZfsError::Malformed("nvlist: truncated directory")
        );
    }

    #[test]
    fn unterminated_nested_list_ends_at_window() {
        let list = NvListBuilder::new()
            .uint64("guid", 5)
            .uint64("state", 3)
            .directory_open("vdev_tree")
            .finish();
        // The root terminator is consumed as the nested list end; walking then
        // runs into the zeroed tail and stops there.
        let vitals = scan_vitals(&label_window(&list)).unwrap();
        assert!(vitals.is_genuine());
    }

    #[test]
    fn extraction_fields_are_independent() {
        let list = NvListBuilder::new().uint64("version", 28).finish();
        let info = extract_label_info(&label_window(&list), Some(5));
        assert_eq!(info.version, Some(28));
        assert_eq!(info.found(), 1);

        let list = NvListBuilder::new()
            .string("name", "tank")
            .uint64("pool_guid", 0xDEAD_BEEF)
            .finish();
        let info = extract_label_info(&label_window(&list), Some(5));
        assert_eq!(info.pool_name.as_deref(), Some("tank"));
        assert_eq!(info.pool_guid, Some(0xDEAD_BEEF));
        assert_eq!(info.guid, None);
        assert_eq!(info.block_size(), None);
    }

    #[test]
    fn nested_identity_fields_are_ignored() {
        let list = NvListBuilder::new()
            .directory("vdev_tree", |d| {
                d.string("name", "inner")
                    .uint64("guid", 1)
                    .uint64("pool_guid", 2)
                    .uint64("version", 3)
                    .uint64("ashift", 9)
            })
            .string("name", "outer")
            .uint64("guid", 10)
            .finish();
        let info = extract_label_info(&label_window(&list), None);
        assert_eq!(info.pool_name.as_deref(), Some("outer"));
        assert_eq!(info.guid, Some(10));
        assert_eq!(info.pool_guid, None);
        assert_eq!(info.version, None);
        assert_eq!(info.ashift, Some(9));
        assert_eq!(info.block_size(), Some(512));
    }

    #[test]
    fn extraction_stops_after_limit() {
        let list = NvListBuilder::new()
            .uint64("version", 5000)
            .string("name", "tank")
            .uint64("pool_guid", 1)
            .uint64("guid", 2)
            .uint64("ashift", 12)
            // Never reached with the default limit.
            .other("bad", DATA_TYPE_UNKNOWN, &[0; 8])
            .finish();
        let window = label_window(&list);

        let info = extract_label_info(&window, Some(ZFS_WANTED_FIELDS));
        assert_eq!(info.found(), 5);

        // Scanning on hits the broken pair but keeps everything found.
        assert_eq!(extract_label_info(&window, None), info);

        let info = extract_label_info(&window, Some(2));
        assert_eq!(info.found(), 2);
        assert_eq!(info.pool_guid, None);
    }

    #[test]
    fn limit_does_not_change_results() {
        let window = crate::testing::LabelImage::default().window();
        assert_eq!(
            extract_label_info(&window, Some(ZFS_WANTED_FIELDS)),
            extract_label_info(&window, None)
        );
    }

    #[test]
    fn malformed_field_stops_extraction() {
        let list = NvListBuilder::new()
            .uint64("version", 1)
            .uint64("name", 7)
            .uint64("guid", 2)
            .finish();
        let info = extract_label_info(&label_window(&list), None);
        assert_eq!(info.version, Some(1));
        assert_eq!(info.pool_name, None);
        assert_eq!(info.guid, None);
    }

    #[test]
    fn ashift_too_large_has_no_block_size() {
        let list = NvListBuilder::new().uint64("ashift", 40).finish();
        let info = extract_label_info(&label_window(&list), None);
        assert_eq!(info.ashift, Some(40));
        assert_eq!(info.block_size(), None);
    }

    #[test]
    fn names_with_trailing_nul_match() {
        let list = NvListBuilder::new()
            .uint64("guid\0", 77)
            .uint64("guidx", 1)
            .finish();
        let info = extract_label_info(&label_window(&list), None);
        assert_eq!(info.guid, Some(77));
    }

    #[test]
    fn truncations_never_panic() {
        let window = crate::testing::LabelImage::default().window();
        let used = 2048;
        for cut in 0..used {
            let w = &window[..cut];
            let _ = scan_vitals(w);
            let _ = extract_label_info(w, None);
        }
    }

    #[test]
    fn corrupted_bytes_never_panic() {
        let base = crate::testing::LabelImage::default().window();
        // xorshift, deterministic
        let mut seed = 0x9E37_79B9_7F4A_7C15u64;
        for _ in 0..2000 {
            let mut w = base.clone();
            for _ in 0..4 {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                let at = (seed as usize) % 1024;
                w[at] = (seed >> 32) as u8;
            }
            let _ = scan_vitals(&w);
            let _ = extract_label_info(&w, None);
        }
    }
}
