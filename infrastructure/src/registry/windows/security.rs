//! Conversions between [`SecurityDescriptor`] and native SIDs and ACLs

use regpilot_application::ports::registry_backend::RegistryError;
use regpilot_domain::{Ace, AceType, SecurityDescriptor, Sid};
use std::mem::size_of;
use std::ptr::null_mut;
use windows_sys::Win32::Foundation::{GetLastError, LocalFree};
use windows_sys::Win32::Security::Authorization::{ConvertSidToStringSidW, ConvertStringSidToSidW};
use windows_sys::Win32::Security::{
    ACCESS_ALLOWED_ACE, ACE_HEADER, ACL, ACL_REVISION, AddAccessAllowedAceEx,
    AddAccessDeniedAceEx, GetAce, GetLengthSid, InitializeAcl, PSID,
};

const ACCESS_ALLOWED_ACE_TYPE: u8 = 0;
const ACCESS_DENIED_ACE_TYPE: u8 = 1;
/// Inheritance bits that may be set explicitly
const VALID_INHERIT_FLAGS: u8 = 0x1F;
/// Set on entries the OS propagated from a parent
pub const INHERITED_ACE: u8 = 0x10;

/// Error for a failed call, carrying `GetLastError`
pub fn last_error(call: &str) -> RegistryError {
    #[allow(unsafe_code)]
    let code = unsafe { GetLastError() };
    super::os_error(code, call)
}

pub fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// A SID allocated by `ConvertStringSidToSidW`
pub struct LocalSid(PSID);

impl LocalSid {
    pub fn parse(sid: &Sid) -> Result<Self, RegistryError> {
        let wide = to_wide(sid.as_str());
        let mut psid: PSID = null_mut();
        #[allow(unsafe_code)]
        let ok = unsafe { ConvertStringSidToSidW(wide.as_ptr(), &mut psid) };
        if ok == 0 {
            return Err(last_error("ConvertStringSidToSidW"));
        }
        Ok(Self(psid))
    }

    pub fn as_psid(&self) -> PSID {
        self.0
    }

    fn len(&self) -> u32 {
        #[allow(unsafe_code)]
        unsafe {
            GetLengthSid(self.0)
        }
    }
}

impl Drop for LocalSid {
    fn drop(&mut self) {
        #[allow(unsafe_code)]
        unsafe {
            LocalFree(self.0 as _);
        }
    }
}

/// String form (`S-1-5-...`) of a native SID
pub fn sid_to_string(psid: PSID) -> Result<Sid, RegistryError> {
    let mut out: *mut u16 = null_mut();
    #[allow(unsafe_code)]
    let ok = unsafe { ConvertSidToStringSidW(psid, &mut out) };
    if ok == 0 {
        return Err(last_error("ConvertSidToStringSidW"));
    }
    #[allow(unsafe_code)]
    let text = unsafe {
        let mut len = 0usize;
        while *out.add(len) != 0 {
            len += 1;
        }
        let text = String::from_utf16_lossy(std::slice::from_raw_parts(out, len));
        LocalFree(out as _);
        text
    };
    Ok(Sid::new(text))
}

/// Read the entries of a native DACL.
///
/// Entry types other than plain allow/deny are skipped. A null DACL yields
/// no entries.
///
/// # Safety
///
/// `acl` must be null or point to a valid ACL.
#[allow(unsafe_code)]
pub unsafe fn read_acl(acl: *const ACL) -> Result<Vec<Ace>, RegistryError> {
    if acl.is_null() {
        return Ok(Vec::new());
    }
    let count = unsafe { (*acl).AceCount };
    let mut entries = Vec::with_capacity(count as usize);
    for index in 0..u32::from(count) {
        let mut raw = null_mut();
        if unsafe { GetAce(acl, index, &mut raw) } == 0 {
            return Err(last_error("GetAce"));
        }
        let header = unsafe { &*(raw as *const ACE_HEADER) };
        let ace_type = match header.AceType {
            ACCESS_ALLOWED_ACE_TYPE => AceType::Allow,
            ACCESS_DENIED_ACE_TYPE => AceType::Deny,
            _ => continue,
        };
        // Allow and deny entries share one layout
        let ace = unsafe { &*(raw as *const ACCESS_ALLOWED_ACE) };
        let sid = sid_to_string(&ace.SidStart as *const u32 as PSID)?;
        entries.push(Ace {
            ace_type,
            sid,
            access_mask: ace.Mask,
            flags: header.AceFlags,
        });
    }
    Ok(entries)
}

/// An ACL built from explicit entries, in a DWORD-aligned buffer
pub struct NativeAcl {
    buffer: Vec<u32>,
}

impl NativeAcl {
    /// Build from `entries`, dropping inherited ones (the OS re-derives them)
    pub fn build(entries: &[Ace]) -> Result<Self, RegistryError> {
        let explicit: Vec<&Ace> = entries.iter().filter(|ace| ace.flags & INHERITED_ACE == 0).collect();
        let sids = explicit
            .iter()
            .map(|ace| LocalSid::parse(&ace.sid))
            .collect::<Result<Vec<_>, _>>()?;

        let ace_overhead = size_of::<ACCESS_ALLOWED_ACE>() - size_of::<u32>();
        let size = size_of::<ACL>()
            + sids.iter().map(|sid| ace_overhead + sid.len() as usize).sum::<usize>();
        let mut buffer = vec![0u32; size.div_ceil(size_of::<u32>())];
        let acl = buffer.as_mut_ptr() as *mut ACL;

        #[allow(unsafe_code)]
        let ok = unsafe { InitializeAcl(acl, (buffer.len() * size_of::<u32>()) as u32, ACL_REVISION) };
        if ok == 0 {
            return Err(last_error("InitializeAcl"));
        }

        for (ace, sid) in explicit.iter().zip(&sids) {
            let flags = u32::from(ace.flags & VALID_INHERIT_FLAGS);
            #[allow(unsafe_code)]
            let ok = unsafe {
                match ace.ace_type {
                    AceType::Allow => {
                        AddAccessAllowedAceEx(acl, ACL_REVISION, flags, ace.access_mask, sid.as_psid())
                    }
                    AceType::Deny => {
                        AddAccessDeniedAceEx(acl, ACL_REVISION, flags, ace.access_mask, sid.as_psid())
                    }
                }
            };
            if ok == 0 {
                return Err(last_error("AddAccessAllowedAceEx"));
            }
        }
        Ok(Self { buffer })
    }

    pub fn as_ptr(&self) -> *const ACL {
        self.buffer.as_ptr() as *const ACL
    }

    pub fn as_mut_ptr(&mut self) -> *mut ACL {
        self.buffer.as_mut_ptr() as *mut ACL
    }
}

/// Owner and DACL of `descriptor` in native form
pub struct NativeDescriptor {
    pub owner: Option<LocalSid>,
    pub dacl: NativeAcl,
}

impl NativeDescriptor {
    pub fn build(descriptor: &SecurityDescriptor) -> Result<Self, RegistryError> {
        Ok(Self {
            owner: descriptor.owner.as_ref().map(LocalSid::parse).transpose()?,
            dacl: NativeAcl::build(&descriptor.dacl)?,
        })
    }
}
