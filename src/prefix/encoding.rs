//! Binary encoding of prefix records
//!
//! Layout, in order: format version, size, uid, gid, mode, mtime, user
//! bitmaps, group bitmaps, child entries, files. Per-file owners are not
//! written; decode restores them from the bitmaps.

use super::{annotate, ChildEntry, FileEntry, IdMap, OwnershipIndex, PrefixInfo};
use crate::codec::{Decoder, Encoder};
use crate::error::{CodecError, CodecResult};
use crate::fs::EntryType;

/// Current prefix record format
pub const FORMAT_VERSION: u8 = 1;

impl PrefixInfo {
    /// Serialize this record
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::with_capacity(64 + self.files.len() * 48);
        enc.put_u8(FORMAT_VERSION);
        enc.put_varint(self.size);
        enc.put_uvarint(u64::from(self.uid));
        enc.put_uvarint(u64::from(self.gid));
        enc.put_u32(self.mode);
        enc.put_time(&self.mtime);

        encode_index(&mut enc, &self.users);
        encode_index(&mut enc, &self.groups);

        enc.put_uvarint(self.children.len() as u64);
        for child in &self.children {
            enc.put_str(&child.name);
            enc.put_u8(child.entry_type.as_u8());
        }

        enc.put_uvarint(self.files.len() as u64);
        for file in &self.files {
            enc.put_str(&file.name);
            enc.put_u8(file.entry_type.as_u8());
            enc.put_u32(file.mode);
            enc.put_varint(file.size);
            enc.put_uvarint(file.blocks);
            enc.put_time(&file.mtime);
        }

        enc.finish()
    }

    /// Deserialize a record; the result is already finalized
    pub fn decode(bytes: &[u8]) -> CodecResult<PrefixInfo> {
        let mut dec = Decoder::new(bytes);

        let version = dec.u8()?;
        if version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: version,
                expected: FORMAT_VERSION,
            });
        }

        let size = dec.varint()?;
        let uid = dec.uvarint_u32()?;
        let gid = dec.uvarint_u32()?;
        let mode = dec.u32()?;
        let mtime = dec.time()?;

        let user_maps = decode_maps(&mut dec)?;
        let group_maps = decode_maps(&mut dec)?;

        let child_count = dec.len_prefix()?;
        let mut children = Vec::with_capacity(child_count);
        for _ in 0..child_count {
            let name = dec.string()?;
            let entry_type = EntryType::from_u8(dec.u8()?);
            children.push(ChildEntry { name, entry_type });
        }

        let file_count = dec.len_prefix()?;
        let mut files = Vec::with_capacity(file_count);
        for _ in 0..file_count {
            files.push(FileEntry {
                name: dec.string()?,
                entry_type: EntryType::from_u8(dec.u8()?),
                mode: dec.u32()?,
                size: dec.varint()?,
                blocks: dec.uvarint()?,
                mtime: dec.time()?,
                uid: None,
                gid: None,
                raw: None,
            });
        }
        dec.finish()?;

        let users = OwnershipIndex::from_parts(uid, user_maps, files.len())?;
        let groups = OwnershipIndex::from_parts(gid, group_maps, files.len())?;
        annotate(&mut files, &users, |f| &mut f.uid);
        annotate(&mut files, &groups, |f| &mut f.gid);

        Ok(PrefixInfo {
            uid,
            gid,
            size,
            mode,
            mtime,
            children,
            files,
            users,
            groups,
        })
    }
}

fn encode_index(enc: &mut Encoder, index: &OwnershipIndex) {
    enc.put_uvarint(index.maps().len() as u64);
    for map in index.maps() {
        enc.put_uvarint(u64::from(map.id()));
        enc.put_uvarint(map.words().len() as u64);
        for &word in map.words() {
            enc.put_uvarint(word);
        }
    }
}

fn decode_maps(dec: &mut Decoder<'_>) -> CodecResult<Vec<IdMap>> {
    let count = dec.len_prefix()?;
    let mut maps = Vec::with_capacity(count);
    for _ in 0..count {
        let id = dec.uvarint_u32()?;
        let word_count = dec.len_prefix()?;
        let mut words = Vec::with_capacity(word_count);
        for _ in 0..word_count {
            words.push(dec.uvarint()?);
        }
        maps.push(IdMap::from_words(id, words));
    }
    Ok(maps)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::PrefixBuilder;
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample() -> PrefixInfo {
        let mut builder = PrefixBuilder::new(&dir_stat(1000, 100));
        let mut odd = file_stat(1001, 100, -1);
        odd.mtime = Utc.timestamp_opt(-86_400, 999_999_999).unwrap();
        builder.append_files([
            FileEntry::from_stat("a.txt", &file_stat(1000, 100, 12)),
            FileEntry::from_stat("b.bin", &file_stat(1001, 200, 1 << 40)),
            FileEntry::from_stat("docs", &dir_stat(1000, 200)),
            FileEntry::from_stat("ünïcode", &odd),
        ]);
        builder.append_child_entries([
            ChildEntry::new("a.txt", EntryType::File),
            ChildEntry::new("b.bin", EntryType::File),
            ChildEntry::new("docs", EntryType::Directory),
            ChildEntry::new("gone", EntryType::Symlink),
            ChildEntry::new("ünïcode", EntryType::File),
        ]);
        builder.finalize().unwrap()
    }

    #[test]
    fn test_round_trip_preserves_ownership() {
        let info = sample();
        let decoded = PrefixInfo::decode(&info.encode()).unwrap();
        assert_eq!(decoded, info);

        // Raw platform metadata is transient
        assert!(info.files()[0].raw.is_some());
        assert!(decoded.files()[0].raw.is_none());

        let users: Vec<_> = decoded.user_scan(1001).map(|(pos, _)| pos).collect();
        assert_eq!(users, vec![1, 3]);
        let groups: Vec<_> = decoded.group_scan(200).map(|(pos, _)| pos).collect();
        assert_eq!(groups, vec![1, 2]);
        assert_eq!(decoded.files()[3].size, -1);
    }

    #[test]
    fn test_round_trip_empty() {
        let info = PrefixBuilder::new(&dir_stat(0, 0)).finalize().unwrap();
        let bytes = info.encode();
        assert_eq!(PrefixInfo::decode(&bytes).unwrap(), info);
    }

    #[test]
    fn test_decode_rejects_version() {
        let mut bytes = sample().encode();
        bytes[0] = 2;
        assert_eq!(
            PrefixInfo::decode(&bytes).unwrap_err(),
            CodecError::UnsupportedVersion {
                found: 2,
                expected: 1
            }
        );
    }

    #[test]
    fn test_decode_truncated_reports_insufficient_data() {
        let bytes = sample().encode();
        for len in 0..bytes.len() {
            assert!(
                matches!(
                    PrefixInfo::decode(&bytes[..len]),
                    Err(CodecError::InsufficientData { .. })
                ),
                "len {}",
                len
            );
        }
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = sample().encode();
        bytes.push(0);
        assert!(matches!(
            PrefixInfo::decode(&bytes),
            Err(CodecError::InvalidData(_))
        ));
    }

    #[test]
    fn test_decode_rejects_owner_only_collection() {
        let mut enc = Encoder::new();
        enc.put_u8(FORMAT_VERSION);
        enc.put_varint(0);
        enc.put_uvarint(7);
        enc.put_uvarint(7);
        enc.put_u32(0o040755);
        enc.put_time(&Utc.timestamp_opt(0, 0).unwrap());
        // users: a single bitmap for the owner itself
        enc.put_uvarint(1);
        enc.put_uvarint(7);
        enc.put_uvarint(1);
        enc.put_uvarint(1);
        // groups: none
        enc.put_uvarint(0);
        // no children, one file
        enc.put_uvarint(0);
        enc.put_uvarint(1);
        enc.put_str("f");
        enc.put_u8(EntryType::File.as_u8());
        enc.put_u32(0o100644);
        enc.put_varint(1);
        enc.put_uvarint(1);
        enc.put_time(&Utc.timestamp_opt(0, 0).unwrap());

        assert!(matches!(
            PrefixInfo::decode(&enc.finish()),
            Err(CodecError::InvalidOwnershipIndex(_))
        ));
    }

    #[test]
    fn test_matching_owners_cost_no_bitmap_bytes() {
        let mut same = PrefixBuilder::new(&dir_stat(1, 1));
        let mut mixed = PrefixBuilder::new(&dir_stat(1, 1));
        for i in 0..100 {
            same.append_file(FileEntry::from_stat(format!("f{:03}", i), &file_stat(1, 1, 10)));
            mixed.append_file(FileEntry::from_stat(
                format!("f{:03}", i),
                &file_stat(1 + (i % 2), 1, 10),
            ));
        }
        let same = same.finalize().unwrap().encode();
        let mixed = mixed.finalize().unwrap().encode();
        assert!(same.len() < mixed.len());
    }
}
