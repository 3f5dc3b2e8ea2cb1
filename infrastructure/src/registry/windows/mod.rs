//! Windows registry backend
//!
//! Value access goes through `winreg`. Owner and DACL handling, key creation
//! with an explicit descriptor and token queries call `windows-sys`
//! directly.

mod security;
pub(crate) mod token;

use super::codec;
use regpilot_application::ports::registry_backend::{
    KeyAccess, RegistryBackend, RegistryError, RegistryKey,
};
use regpilot_domain::{ConfigValue, Hive, KeyPath, SecurityDescriptor, Sid, ValueKind};
use security::{NativeDescriptor, last_error, read_acl, sid_to_string, to_wide};
use std::mem::size_of;
use std::ptr::{null, null_mut};
use tracing::debug;
use windows_sys::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_PATH_NOT_FOUND, ERROR_SUCCESS, HANDLE,
    LocalFree,
};
use windows_sys::Win32::Security::Authorization::{GetSecurityInfo, SE_REGISTRY_KEY, SetSecurityInfo};
use windows_sys::Win32::Security::{
    ACL, DACL_SECURITY_INFORMATION, InitializeSecurityDescriptor, OWNER_SECURITY_INFORMATION,
    PSECURITY_DESCRIPTOR, PSID, SECURITY_ATTRIBUTES, SECURITY_DESCRIPTOR,
    SetSecurityDescriptorDacl, SetSecurityDescriptorOwner, UNPROTECTED_DACL_SECURITY_INFORMATION,
};
use windows_sys::Win32::System::Registry as native;
use winreg::enums::{KEY_READ, KEY_WRITE, RegType};
use winreg::{RegKey, RegValue};

const READ_CONTROL: u32 = 0x0002_0000;
const WRITE_DAC: u32 = 0x0004_0000;
const WRITE_OWNER: u32 = 0x0008_0000;
const SECURITY_DESCRIPTOR_REVISION: u32 = 1;

/// Map a Win32 error code for `context` onto [`RegistryError`]
pub(crate) fn os_error(code: u32, context: &str) -> RegistryError {
    match code {
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND => RegistryError::not_found(context),
        ERROR_ACCESS_DENIED => RegistryError::access_denied(context),
        _ => RegistryError::Os {
            code: code as i32,
            message: format!("{}: {}", context, std::io::Error::from_raw_os_error(code as i32)),
        },
    }
}

fn io_error(err: std::io::Error, context: &impl std::fmt::Display) -> RegistryError {
    match err.raw_os_error() {
        Some(code) => os_error(code as u32, &context.to_string()),
        None => RegistryError::Os {
            code: -1,
            message: format!("{}: {}", context, err),
        },
    }
}

fn predef(hive: Hive) -> RegKey {
    RegKey::predef(match hive {
        Hive::LocalMachine => winreg::enums::HKEY_LOCAL_MACHINE,
        Hive::CurrentUser => winreg::enums::HKEY_CURRENT_USER,
        Hive::ClassesRoot => winreg::enums::HKEY_CLASSES_ROOT,
        Hive::Users => winreg::enums::HKEY_USERS,
        Hive::CurrentConfig => winreg::enums::HKEY_CURRENT_CONFIG,
    })
}

fn native_root(hive: Hive) -> native::HKEY {
    match hive {
        Hive::LocalMachine => native::HKEY_LOCAL_MACHINE,
        Hive::CurrentUser => native::HKEY_CURRENT_USER,
        Hive::ClassesRoot => native::HKEY_CLASSES_ROOT,
        Hive::Users => native::HKEY_USERS,
        Hive::CurrentConfig => native::HKEY_CURRENT_CONFIG,
    }
}

fn value_kind(vtype: &RegType) -> Option<ValueKind> {
    match vtype {
        RegType::REG_DWORD => Some(ValueKind::Dword),
        RegType::REG_QWORD => Some(ValueKind::Qword),
        RegType::REG_SZ => Some(ValueKind::String),
        RegType::REG_EXPAND_SZ => Some(ValueKind::ExpandString),
        RegType::REG_MULTI_SZ => Some(ValueKind::MultiString),
        RegType::REG_BINARY => Some(ValueKind::Binary),
        _ => None,
    }
}

fn reg_type(kind: ValueKind) -> RegType {
    match kind {
        ValueKind::Dword => RegType::REG_DWORD,
        ValueKind::Qword => RegType::REG_QWORD,
        ValueKind::String => RegType::REG_SZ,
        ValueKind::ExpandString => RegType::REG_EXPAND_SZ,
        ValueKind::MultiString => RegType::REG_MULTI_SZ,
        ValueKind::Binary => RegType::REG_BINARY,
    }
}

/// A raw key handle for the security APIs; closed on drop
struct NativeKey(native::HKEY);

impl NativeKey {
    fn open(key: &KeyPath, access: u32) -> Result<Self, RegistryError> {
        let sub_key = to_wide(key.sub_key());
        let mut hkey: native::HKEY = null_mut();
        #[allow(unsafe_code)]
        let status = unsafe {
            native::RegOpenKeyExW(native_root(key.hive()), sub_key.as_ptr(), 0, access, &mut hkey)
        };
        if status != ERROR_SUCCESS {
            return Err(os_error(status, &key.to_string()));
        }
        Ok(Self(hkey))
    }

    fn handle(&self) -> HANDLE {
        self.0 as HANDLE
    }
}

impl Drop for NativeKey {
    fn drop(&mut self) {
        #[allow(unsafe_code)]
        unsafe {
            native::RegCloseKey(self.0);
        }
    }
}

struct WindowsKey {
    key: RegKey,
    path: KeyPath,
}

impl RegistryKey for WindowsKey {
    fn path(&self) -> &KeyPath {
        &self.path
    }

    fn get_value(&self, name: &str) -> Result<Option<ConfigValue>, RegistryError> {
        match self.key.get_raw_value(name) {
            Ok(raw) => Ok(Some(codec::decode(value_kind(&raw.vtype), &raw.bytes))),
            Err(e) => match io_error(e, &self.path) {
                RegistryError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    fn set_value(&self, name: &str, value: &ConfigValue) -> Result<(), RegistryError> {
        let (kind, bytes) = codec::encode(value);
        let raw = RegValue {
            bytes,
            vtype: reg_type(kind),
        };
        self.key
            .set_raw_value(name, &raw)
            .map_err(|e| io_error(e, &self.path))
    }

    fn delete_value(&self, name: &str) -> Result<(), RegistryError> {
        self.key
            .delete_value(name)
            .map_err(|e| io_error(e, &format!("{} [{}]", self.path, name)))
    }
}

/// [`RegistryBackend`] over the live Windows registry
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsRegistry;

impl WindowsRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Whether this process runs with an elevated token
    pub fn is_elevated() -> bool {
        token::is_elevated()
    }

    fn create_with_descriptor(
        &self,
        key: &KeyPath,
        descriptor: &SecurityDescriptor,
    ) -> Result<(), RegistryError> {
        let native_sd = NativeDescriptor::build(descriptor)?;
        #[allow(unsafe_code)]
        let mut sd: SECURITY_DESCRIPTOR = unsafe { std::mem::zeroed() };
        let psd = &mut sd as *mut SECURITY_DESCRIPTOR as PSECURITY_DESCRIPTOR;

        #[allow(unsafe_code)]
        unsafe {
            if InitializeSecurityDescriptor(psd, SECURITY_DESCRIPTOR_REVISION) == 0 {
                return Err(last_error("InitializeSecurityDescriptor"));
            }
            if let Some(owner) = &native_sd.owner
                && SetSecurityDescriptorOwner(psd, owner.as_psid(), 0) == 0
            {
                return Err(last_error("SetSecurityDescriptorOwner"));
            }
            if SetSecurityDescriptorDacl(psd, 1, native_sd.dacl.as_ptr(), 0) == 0 {
                return Err(last_error("SetSecurityDescriptorDacl"));
            }
        }

        let attributes = SECURITY_ATTRIBUTES {
            nLength: size_of::<SECURITY_ATTRIBUTES>() as u32,
            lpSecurityDescriptor: psd,
            bInheritHandle: 0,
        };
        let sub_key = to_wide(key.sub_key());
        let mut hkey: native::HKEY = null_mut();
        #[allow(unsafe_code)]
        let status = unsafe {
            native::RegCreateKeyExW(
                native_root(key.hive()),
                sub_key.as_ptr(),
                0,
                null(),
                native::REG_OPTION_NON_VOLATILE,
                native::KEY_READ,
                &attributes,
                &mut hkey,
                null_mut(),
            )
        };
        if status != ERROR_SUCCESS {
            return Err(os_error(status, &key.to_string()));
        }
        drop(NativeKey(hkey));
        debug!("Created {} with explicit owner", key);
        Ok(())
    }
}

/// Owner and entries of a descriptor returned by `GetSecurityInfo`
///
/// # Safety
///
/// `owner` and `dacl` must be null or point into a live descriptor.
#[allow(unsafe_code)]
unsafe fn describe(owner: PSID, dacl: *const ACL) -> Result<SecurityDescriptor, RegistryError> {
    let owner = if owner.is_null() {
        None
    } else {
        Some(sid_to_string(owner)?)
    };
    let dacl = unsafe { read_acl(dacl)? };
    Ok(SecurityDescriptor { owner, dacl })
}

impl RegistryBackend for WindowsRegistry {
    fn open_key(
        &self,
        key: &KeyPath,
        access: KeyAccess,
    ) -> Result<Box<dyn RegistryKey>, RegistryError> {
        let flags = match access {
            KeyAccess::Read => KEY_READ,
            KeyAccess::ReadWrite => KEY_READ | KEY_WRITE,
        };
        let handle = predef(key.hive())
            .open_subkey_with_flags(key.sub_key(), flags)
            .map_err(|e| io_error(e, key))?;
        Ok(Box::new(WindowsKey {
            key: handle,
            path: key.clone(),
        }))
    }

    fn create_subkey(
        &self,
        parent: &KeyPath,
        name: &str,
        security: Option<&SecurityDescriptor>,
    ) -> Result<(), RegistryError> {
        let child = parent.child(name);
        match security {
            Some(descriptor) => self.create_with_descriptor(&child, descriptor),
            None => predef(child.hive())
                .create_subkey(child.sub_key())
                .map(|_| ())
                .map_err(|e| io_error(e, &child)),
        }
    }

    fn delete_key_tree(&self, key: &KeyPath) -> Result<(), RegistryError> {
        if key.is_root() {
            return Err(RegistryError::InvalidPath(key.to_string()));
        }
        predef(key.hive())
            .delete_subkey_all(key.sub_key())
            .map_err(|e| io_error(e, key))
    }

    fn read_security(&self, key: &KeyPath) -> Result<SecurityDescriptor, RegistryError> {
        let handle = NativeKey::open(key, READ_CONTROL)?;
        let mut owner: PSID = null_mut();
        let mut dacl: *mut ACL = null_mut();
        let mut sd: PSECURITY_DESCRIPTOR = null_mut();
        #[allow(unsafe_code)]
        let status = unsafe {
            GetSecurityInfo(
                handle.handle(),
                SE_REGISTRY_KEY,
                OWNER_SECURITY_INFORMATION | DACL_SECURITY_INFORMATION,
                &mut owner,
                null_mut(),
                &mut dacl,
                null_mut(),
                &mut sd,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(os_error(status, &key.to_string()));
        }

        #[allow(unsafe_code)]
        let described = unsafe { describe(owner, dacl) };
        #[allow(unsafe_code)]
        unsafe {
            LocalFree(sd as _);
        }
        described
    }

    fn write_security(
        &self,
        key: &KeyPath,
        descriptor: &SecurityDescriptor,
    ) -> Result<(), RegistryError> {
        for privilege in [token::SE_TAKE_OWNERSHIP_NAME, token::SE_RESTORE_NAME] {
            if let Err(e) = token::enable_privilege(privilege) {
                debug!("{} not available: {}", privilege, e);
            }
        }
        let native_sd = NativeDescriptor::build(descriptor)?;

        // The owner goes first: the new owner is implicitly granted WRITE_DAC
        if let Some(owner) = &native_sd.owner {
            let handle = NativeKey::open(key, WRITE_OWNER)?;
            #[allow(unsafe_code)]
            let status = unsafe {
                SetSecurityInfo(
                    handle.handle(),
                    SE_REGISTRY_KEY,
                    OWNER_SECURITY_INFORMATION,
                    owner.as_psid(),
                    null_mut(),
                    null(),
                    null(),
                )
            };
            if status != ERROR_SUCCESS {
                return Err(os_error(status, &key.to_string()));
            }
        }

        let handle = NativeKey::open(key, WRITE_DAC)?;
        #[allow(unsafe_code)]
        let status = unsafe {
            SetSecurityInfo(
                handle.handle(),
                SE_REGISTRY_KEY,
                DACL_SECURITY_INFORMATION | UNPROTECTED_DACL_SECURITY_INFORMATION,
                null_mut(),
                null_mut(),
                native_sd.dacl.as_ptr(),
                null(),
            )
        };
        if status != ERROR_SUCCESS {
            return Err(os_error(status, &key.to_string()));
        }
        debug!("Rewrote owner and DACL of {}", key);
        Ok(())
    }

    fn current_user_sid(&self) -> Result<Sid, RegistryError> {
        token::current_user_sid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_key() -> KeyPath {
        KeyPath::new(
            Hive::CurrentUser,
            &format!("Software\\regpilot-test-{}", std::process::id()),
        )
    }

    #[test]
    fn test_error_code_mapping() {
        assert!(os_error(ERROR_FILE_NOT_FOUND, "x").is_not_found());
        assert!(os_error(ERROR_PATH_NOT_FOUND, "x").is_not_found());
        assert!(os_error(ERROR_ACCESS_DENIED, "x").is_access_denied());
        assert!(matches!(os_error(1015, "x"), RegistryError::Os { code: 1015, .. }));
    }

    #[test]
    fn test_create_with_descriptor_and_values() {
        let registry = WindowsRegistry::new();
        let key = scratch_key();
        let user = registry.current_user_sid().unwrap();
        let parent = key.parent().unwrap();

        registry
            .create_subkey(&parent, key.name().unwrap(), Some(&SecurityDescriptor::full_control(&user)))
            .unwrap();
        assert_eq!(registry.read_security(&key).unwrap().owner, Some(user));

        let handle = registry.open_key(&key, KeyAccess::ReadWrite).unwrap();
        handle.set_value("Multi", &ConfigValue::MultiString(vec!["a".into(), "b".into()])).unwrap();
        assert_eq!(
            handle.get_value("Multi").unwrap(),
            Some(ConfigValue::MultiString(vec!["a".into(), "b".into()]))
        );
        assert_eq!(handle.get_value("Missing").unwrap(), None);
        drop(handle);

        registry.delete_key_tree(&key).unwrap();
        assert!(registry.open_key(&key, KeyAccess::Read).err().unwrap().is_not_found());
    }
}
