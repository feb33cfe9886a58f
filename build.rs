// 构建脚本: 静态链接 FFmpeg 时补齐 Windows 系统库
fn main() {
    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        // vcpkg 静态 FFmpeg 依赖的系统库 (QSV / OLE / VFW / Schannel)
        for lib in ["libmfx", "oleaut32", "vfw32", "secur32"] {
            println!("cargo:rustc-link-lib=dylib={}", lib);
        }
    }
}
