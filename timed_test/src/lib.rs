/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Test attributes that fail a test instead of hanging it.
//!
//! Lazy evaluation tests block on computations that are scheduled on
//! other threads; a lost wakeup or a worker pinned by a blocking call
//! shows up as a hang. These macros run the test body on a separate
//! thread and panic if it does not finish before the deadline.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::Expr;
use syn::ItemFn;
use syn::Lit;
use syn::MetaNameValue;
use syn::Token;
use syn::parse_macro_input;
use syn::punctuated::Punctuated;

struct Args {
    timeout_secs: u64,
    worker_threads: usize,
}

fn int_value<T>(attr: &MetaNameValue) -> Result<T, syn::Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match &attr.value {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Int(val) => val.base10_parse::<T>(),
            _ => Err(syn::Error::new_spanned(
                &attr.value,
                "unexpected value, please pass an integer literal",
            )),
        },
        _ => Err(syn::Error::new_spanned(
            &attr.value,
            "unexpected value, please pass an integer literal",
        )),
    }
}

fn parse_args(
    attrs: Punctuated<MetaNameValue, Token![,]>,
    allow_workers: bool,
) -> Result<Args, syn::Error> {
    let mut timeout_secs = None;
    let mut worker_threads = 8;
    for attr in attrs.iter() {
        if attr.path.is_ident("timeout_secs") {
            timeout_secs = Some(int_value::<u64>(attr)?);
        } else if allow_workers && attr.path.is_ident("worker_threads") {
            worker_threads = int_value::<usize>(attr)?;
        } else {
            let allowed = if allow_workers {
                "only timeout_secs and worker_threads allowed as arguments"
            } else {
                "only timeout_secs allowed as argument"
            };
            return Err(syn::Error::new_spanned(&attr.path, allowed));
        }
    }
    let timeout_secs = timeout_secs.ok_or_else(|| {
        syn::Error::new(proc_macro2::Span::call_site(), "timeout_secs is required")
    })?;
    Ok(Args {
        timeout_secs,
        worker_threads,
    })
}

/// Run `body` (an expression producing the test's result) on a fresh
/// thread and wait for it with a deadline that fires independently of
/// whatever the body is blocked on.
fn with_deadline(input_fn: &ItemFn, timeout_secs: u64, body: TokenStream2) -> TokenStream2 {
    let fn_attrs = &input_fn.attrs;
    let fn_vis = &input_fn.vis;
    let sig = &input_fn.sig;
    let fn_name = &sig.ident;
    let output = &sig.output;

    quote! {
        #[test]
        #(#fn_attrs)*
        #fn_vis fn #fn_name() #output {
            use std::sync::mpsc::{channel, RecvTimeoutError};
            use std::thread;
            use std::time::Duration;

            let (result_tx, result_rx) = channel();

            thread::spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| #body));
                let _ = result_tx.send(result);
            });

            match result_rx.recv_timeout(Duration::from_secs(#timeout_secs)) {
                Ok(result) => match result {
                    Ok(test_result) => test_result,
                    Err(panic) => std::panic::resume_unwind(panic),
                },
                Err(RecvTimeoutError::Timeout) => {
                    panic!("test timed out after {} seconds", #timeout_secs);
                },
                Err(RecvTimeoutError::Disconnected) => {
                    panic!("test thread panicked without sending result");
                }
            }
        }
    }
}

/// A test macro for synchronous tests with a timeout.
///
/// # Examples
///
/// ```rust,ignore
/// #[timed_test(timeout_secs = 5)]
/// fn my_test() {
///     // Test that should complete within 5 seconds
///     std::thread::sleep(std::time::Duration::from_secs(2));
/// }
/// ```
#[proc_macro_attribute]
pub fn timed_test(attr: TokenStream, input: TokenStream) -> TokenStream {
    let attrs = parse_macro_input!(attr with Punctuated::<MetaNameValue, Token![,]>::parse_terminated);
    let input_fn = parse_macro_input!(input as ItemFn);

    let args = match parse_args(attrs, false) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error().into(),
    };
    if input_fn.sig.asyncness.is_some() {
        return syn::Error::new_spanned(&input_fn.sig, "use async_timed_test for async functions")
            .to_compile_error()
            .into();
    }

    let fn_block = &input_fn.block;
    with_deadline(&input_fn, args.timeout_secs, quote! { #fn_block }).into()
}

/// A test macro that wraps a multi-threaded tokio runtime and adds a
/// configurable timeout. `worker_threads` defaults to 8.
///
/// # Examples
///
/// ```rust,ignore
/// #[async_timed_test(timeout_secs = 5)]
/// async fn my_test() {
///     // Test that should complete within 5 seconds
///     tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
/// }
///
/// #[async_timed_test(timeout_secs = 5, worker_threads = 2)]
/// async fn small_pool() {}
/// ```
#[proc_macro_attribute]
pub fn async_timed_test(attr: TokenStream, input: TokenStream) -> TokenStream {
    let attrs = parse_macro_input!(attr with Punctuated::<MetaNameValue, Token![,]>::parse_terminated);
    let input_fn = parse_macro_input!(input as ItemFn);

    let args = match parse_args(attrs, true) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error().into(),
    };
    if input_fn.sig.asyncness.is_none() {
        return syn::Error::new_spanned(&input_fn.sig, "test function must be async")
            .to_compile_error()
            .into();
    }

    let fn_block = &input_fn.block;
    let worker_threads = args.worker_threads;
    // The runtime lives on the deadline thread, so a stuck runtime
    // cannot prevent the timeout from firing.
    let body = quote! {
        {
            let test_rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(#worker_threads)
                .enable_all()
                .build()
                .unwrap();
            test_rt.block_on(async #fn_block)
        }
    };
    with_deadline(&input_fn, args.timeout_secs, body).into()
}
