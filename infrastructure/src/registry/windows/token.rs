//! Process token queries: user SID, elevation and privileges

use super::security::{last_error, sid_to_string, to_wide};
use regpilot_application::ports::registry_backend::RegistryError;
use regpilot_domain::Sid;
use std::mem::size_of;
use std::ptr::{null, null_mut};
use tracing::debug;
use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE, LUID};
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, GetTokenInformation, LUID_AND_ATTRIBUTES, LookupPrivilegeValueW,
    SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES, TOKEN_ELEVATION, TOKEN_PRIVILEGES, TOKEN_QUERY,
    TOKEN_USER, TokenElevation, TokenUser,
};
use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

pub const SE_TAKE_OWNERSHIP_NAME: &str = "SeTakeOwnershipPrivilege";
pub const SE_RESTORE_NAME: &str = "SeRestorePrivilege";

struct Token(HANDLE);

impl Token {
    fn open(access: u32) -> Result<Self, RegistryError> {
        let mut handle: HANDLE = null_mut();
        #[allow(unsafe_code)]
        let ok = unsafe { OpenProcessToken(GetCurrentProcess(), access, &mut handle) };
        if ok == 0 {
            return Err(last_error("OpenProcessToken"));
        }
        Ok(Self(handle))
    }

    /// Variable-length token information, in an 8-byte aligned buffer
    fn information(&self, class: i32) -> Result<Vec<u64>, RegistryError> {
        let mut needed = 0u32;
        #[allow(unsafe_code)]
        unsafe {
            GetTokenInformation(self.0, class, null_mut(), 0, &mut needed);
        }
        if needed == 0 {
            return Err(last_error("GetTokenInformation"));
        }
        let mut buffer = vec![0u64; (needed as usize).div_ceil(size_of::<u64>())];
        #[allow(unsafe_code)]
        let ok = unsafe {
            GetTokenInformation(
                self.0,
                class,
                buffer.as_mut_ptr().cast(),
                (buffer.len() * size_of::<u64>()) as u32,
                &mut needed,
            )
        };
        if ok == 0 {
            return Err(last_error("GetTokenInformation"));
        }
        Ok(buffer)
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        #[allow(unsafe_code)]
        unsafe {
            CloseHandle(self.0);
        }
    }
}

/// SID of the user the current process runs as
pub fn current_user_sid() -> Result<Sid, RegistryError> {
    let token = Token::open(TOKEN_QUERY)?;
    let buffer = token.information(TokenUser)?;
    #[allow(unsafe_code)]
    let user = unsafe { &*(buffer.as_ptr() as *const TOKEN_USER) };
    sid_to_string(user.User.Sid)
}

/// Whether the current process token is elevated
pub fn is_elevated() -> bool {
    let Ok(token) = Token::open(TOKEN_QUERY) else {
        return false;
    };
    match token.information(TokenElevation) {
        Ok(buffer) => {
            #[allow(unsafe_code)]
            let elevation = unsafe { &*(buffer.as_ptr() as *const TOKEN_ELEVATION) };
            elevation.TokenIsElevated != 0
        }
        Err(_) => false,
    }
}

/// Enable `name` on the process token. Fails when the token does not hold it.
pub fn enable_privilege(name: &str) -> Result<(), RegistryError> {
    let token = Token::open(TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY)?;
    let wide = to_wide(name);
    let mut luid = LUID {
        LowPart: 0,
        HighPart: 0,
    };
    #[allow(unsafe_code)]
    let ok = unsafe { LookupPrivilegeValueW(null(), wide.as_ptr(), &mut luid) };
    if ok == 0 {
        return Err(last_error("LookupPrivilegeValueW"));
    }

    let privileges = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };
    #[allow(unsafe_code)]
    let ok = unsafe {
        AdjustTokenPrivileges(token.0, 0, &privileges, 0, null_mut(), null_mut())
    };
    // A missing privilege still returns success, with ERROR_NOT_ALL_ASSIGNED
    #[allow(unsafe_code)]
    let code = unsafe { GetLastError() };
    if ok == 0 || code != 0 {
        return Err(super::os_error(code, "AdjustTokenPrivileges"));
    }
    debug!("Enabled {}", name);
    Ok(())
}
